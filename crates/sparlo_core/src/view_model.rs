use chrono::{DateTime, Utc};

use crate::chat::ChatMessage;
use crate::report::{ReportId, ReportStatus, StatusBadge};
use crate::toc::TocSection;
use crate::usage::UsageLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewModel {
    pub dashboard: DashboardView,
    pub report: Option<ReportView>,
    /// Report requested but not yet loaded.
    pub opening: Option<ReportId>,
    pub chat: ChatView,
    pub usage: Option<UsageView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub rows: Vec<ReportRowView>,
    pub query: String,
    pub status_filter: Option<ReportStatus>,
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRowView {
    pub id: ReportId,
    pub title: String,
    pub status: ReportStatus,
    pub badge: StatusBadge,
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportView {
    pub id: ReportId,
    pub title: String,
    pub badge: StatusBadge,
    pub current_step: Option<String>,
    pub phase_progress: Option<u8>,
    pub markdown: String,
    pub structured: bool,
    pub fallback_reason: Option<String>,
    pub sections: Vec<TocSection>,
    pub active_section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub open: bool,
    pub input: String,
    pub messages: Vec<ChatMessage>,
    pub streaming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageView {
    pub percent: u8,
    pub level: UsageLevel,
    pub tokens_used: u64,
    pub tokens_limit: u64,
    pub reports_count: u64,
    pub chat_tokens_used: u64,
}
