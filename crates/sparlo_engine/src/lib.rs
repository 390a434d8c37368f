//! Sparlo engine: HTTP, streaming and export IO behind the effects the core emits.
mod api;
mod chat;
mod client;
mod engine;
mod export;
mod filename;
mod persist;
mod sse;
mod types;

pub use api::{ReportApi, ReqwestReportApi};
pub use chat::{ChannelEventSink, ChatOutcome, ChatStreamer, EventSink, ReqwestChatStreamer};
pub use client::{ApiAuth, ClientSettings, HttpClient, BENCHMARK_KEY_HEADER, DEFAULT_BASE_URL};
pub use engine::{EngineConfig, EngineError, EngineHandle};
pub use export::{build_export_document, ExportClock, ExportError, ExportSummary, ReportExporter};
pub use filename::export_stem;
pub use persist::{ensure_export_dir, ExportBatch, PersistError};
pub use sse::{EventStreamDecoder, StreamEvent};
pub use types::{ApiError, ChatEvent, EngineEvent, FailureKind};
