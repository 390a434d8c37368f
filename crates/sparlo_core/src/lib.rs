//! Sparlo core: pure state machines, report model and view-model helpers.
mod bus;
mod chat;
mod dashboard;
mod effect;
mod msg;
mod notify;
mod render;
mod report;
mod schema;
mod state;
mod toc;
mod update;
mod usage;
mod view_model;

pub use bus::{AppEvent, EventBus, Listener};
pub use chat::{
    retry_after_minutes, ChatContext, ChatFailure, ChatMessage, ChatMsg, ChatPanel, ChatRequest,
    Role, StreamId, AUTO_SCROLL_THRESHOLD_PX,
};
pub use dashboard::{
    matches_query, Dashboard, DashboardMsg, OptimisticAction, OptimisticState, PendingChange,
    POLL_INTERVAL_TICKS,
};
pub use effect::Effect;
pub use msg::Msg;
pub use notify::{Notification, NotificationLevel};
pub use render::{render_content, render_markdown, slugify, toc_sections};
pub use report::{
    status_badge, BadgeTone, Clarification, CreatedReport, ReportId, ReportRecord, ReportStatus,
    ReportSummary, StatusBadge,
};
pub use schema::{
    Appendix, Brief, ConceptTrack, ConfidenceLevel, Constraints, ExecutiveSummary,
    LikelihoodColor, Metadata, NextStep, NextSteps, ProblemAnalysis, ReportContent, Risk, Risks,
    SchemaError, SolutionConcept, SolutionConcepts, StructuredReport, Viability,
    MAX_CONCEPTS, MAX_LONG_TEXT_CHARS, MAX_SHORT_TEXT_CHARS, MAX_TITLE_CHARS,
};
pub use state::{AppState, OpenedReport};
pub use toc::{SectionTop, TocMsg, TocSection, TocTracker, DEFAULT_SCROLL_OFFSET};
pub use update::update;
pub use usage::{Subscription, SubscriptionStatus, UsageLevel, UsageSnapshot};
pub use view_model::{
    AppViewModel, ChatView, DashboardView, ReportRowView, ReportView, UsageView,
};
