use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use sparlo_core::{ChatRequest, ReportId, ReportRecord, StreamId};
use sparlo_logging::{sparlo_debug, sparlo_error, sparlo_info};
use tokio_util::sync::CancellationToken;

use crate::api::{ReportApi, ReqwestReportApi};
use crate::chat::{ChannelEventSink, ChatStreamer, EventSink, ReqwestChatStreamer};
use crate::client::{ClientSettings, HttpClient};
use crate::export::{ExportClock, ReportExporter};
use crate::{ApiError, ChatEvent, EngineEvent};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not configure the http client: {0}")]
    Client(#[from] ApiError),
    #[error("could not start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct EngineConfig {
    pub client: ClientSettings,
    pub export_dir: PathBuf,
    pub exported_utc: ExportClock,
}

impl EngineConfig {
    pub fn new(client: ClientSettings, export_dir: PathBuf) -> Self {
        Self {
            client,
            export_dir,
            exported_utc: Arc::new(|| chrono::Utc::now().to_rfc3339()),
        }
    }
}

enum EngineCommand {
    StartChat {
        stream_id: StreamId,
        request: ChatRequest,
    },
    CancelChat {
        stream_id: StreamId,
    },
    LoadReports,
    LoadReport {
        report_id: ReportId,
    },
    CreateReport {
        design_challenge: String,
    },
    Archive {
        report_id: ReportId,
    },
    Cancel {
        report_id: ReportId,
    },
    CheckUsage,
    LoadSubscription,
    Export {
        record: Box<ReportRecord>,
    },
}

/// Owns the IO thread. Clones share the same thread and event queue.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

struct Backends {
    api: Arc<dyn ReportApi>,
    chat: Arc<dyn ChatStreamer>,
    exporter: ReportExporter,
    streams: Mutex<HashMap<StreamId, CancellationToken>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let http = HttpClient::new(config.client)?;
        Self::with_backends(
            Arc::new(ReqwestReportApi::new(http.clone())),
            Arc::new(ReqwestChatStreamer::new(http)),
            ReportExporter::new(config.export_dir, config.exported_utc),
        )
    }

    pub fn with_backends(
        api: Arc<dyn ReportApi>,
        chat: Arc<dyn ChatStreamer>,
        exporter: ReportExporter,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sparlo-engine")
            .enable_all()
            .build()?;
        let backends = Arc::new(Backends {
            api,
            chat,
            exporter,
            streams: Mutex::new(HashMap::new()),
        });

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                // Streams are registered before their task runs so a cancel
                // sent right after the start always finds its token.
                let cancel = match &command {
                    EngineCommand::StartChat { stream_id, .. } => {
                        backends.register_stream(*stream_id)
                    }
                    EngineCommand::CancelChat { stream_id } => {
                        backends.cancel_stream(*stream_id);
                        continue;
                    }
                    _ => CancellationToken::new(),
                };
                let backends = backends.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(&backends, command, cancel, event_tx).await;
                });
            }
            sparlo_debug!("Engine command channel closed; shutting down");
        });

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }

    pub fn start_chat(&self, stream_id: StreamId, request: ChatRequest) {
        self.send(EngineCommand::StartChat { stream_id, request });
    }

    pub fn cancel_chat(&self, stream_id: StreamId) {
        self.send(EngineCommand::CancelChat { stream_id });
    }

    pub fn load_reports(&self) {
        self.send(EngineCommand::LoadReports);
    }

    pub fn load_report(&self, report_id: ReportId) {
        self.send(EngineCommand::LoadReport { report_id });
    }

    pub fn create_report(&self, design_challenge: String) {
        self.send(EngineCommand::CreateReport { design_challenge });
    }

    pub fn archive_report(&self, report_id: ReportId) {
        self.send(EngineCommand::Archive { report_id });
    }

    pub fn cancel_report(&self, report_id: ReportId) {
        self.send(EngineCommand::Cancel { report_id });
    }

    pub fn check_usage(&self) {
        self.send(EngineCommand::CheckUsage);
    }

    pub fn load_subscription(&self) {
        self.send(EngineCommand::LoadSubscription);
    }

    pub fn export_report(&self, record: ReportRecord) {
        self.send(EngineCommand::Export {
            record: Box::new(record),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout)
            .ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            sparlo_error!("Engine thread is gone; command dropped");
        }
    }
}

impl Backends {
    fn register_stream(&self, stream_id: StreamId) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stream_id, token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    fn cancel_stream(&self, stream_id: StreamId) {
        let token = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&stream_id);
        match token {
            Some(token) => {
                sparlo_info!("Cancelling chat stream {}", stream_id);
                token.cancel();
            }
            None => sparlo_debug!("Chat stream {} already finished", stream_id),
        }
    }

    fn finish_stream(&self, stream_id: StreamId) {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&stream_id);
    }
}

async fn handle_command(
    backends: &Backends,
    command: EngineCommand,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let sink = ChannelEventSink::new(event_tx);
    let api = backends.api.as_ref();
    match command {
        EngineCommand::StartChat { stream_id, request } => {
            let result = backends
                .chat
                .stream(stream_id, &request, &sink, &cancel)
                .await;
            backends.finish_stream(stream_id);
            let event = match result {
                Ok(outcome) => ChatEvent::Done {
                    saved: outcome.saved,
                },
                Err(err) => {
                    if !err.is_cancelled() {
                        sparlo_error!("Chat stream {} failed: {}", stream_id, err);
                    }
                    ChatEvent::Failed(err)
                }
            };
            sink.emit(EngineEvent::Chat { stream_id, event });
        }
        EngineCommand::CancelChat { stream_id } => backends.cancel_stream(stream_id),
        EngineCommand::LoadReports => {
            sink.emit(EngineEvent::ReportsLoaded(api.list_reports().await));
        }
        EngineCommand::LoadReport { report_id } => {
            let result = api.get_report(&report_id).await;
            sink.emit(EngineEvent::ReportLoaded { report_id, result });
        }
        EngineCommand::CreateReport { design_challenge } => {
            let result = api.create_report(&design_challenge).await;
            if let Ok(report_id) = &result {
                sparlo_info!("Created report {}", report_id);
            }
            sink.emit(EngineEvent::ReportCreated(result));
        }
        EngineCommand::Archive { report_id } => {
            let result = api.archive_report(&report_id).await;
            sink.emit(EngineEvent::ArchiveFinished { report_id, result });
        }
        EngineCommand::Cancel { report_id } => {
            let result = api.cancel_report(&report_id).await;
            sink.emit(EngineEvent::CancelFinished { report_id, result });
        }
        EngineCommand::CheckUsage => {
            sink.emit(EngineEvent::UsageLoaded(api.check_usage().await));
        }
        EngineCommand::LoadSubscription => {
            sink.emit(EngineEvent::SubscriptionLoaded(api.subscription().await));
        }
        EngineCommand::Export { record } => {
            let exporter = backends.exporter.clone();
            let report_id = record.id.clone();
            let result = tokio::task::spawn_blocking(move || exporter.export(&record))
                .await
                .map_err(|err| err.to_string())
                .and_then(|exported| exported.map_err(|err| err.to_string()))
                .map(|summary| summary.markdown_path);
            sink.emit(EngineEvent::ExportFinished { report_id, result });
        }
    }
}
