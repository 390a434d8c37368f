use std::path::PathBuf;

use crate::chat::ChatMsg;
use crate::dashboard::DashboardMsg;
use crate::report::{ReportId, ReportRecord};
use crate::toc::TocMsg;
use crate::usage::{Subscription, UsageSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// App shell finished booting.
    Started,
    Chat(ChatMsg),
    Toc(TocMsg),
    Dashboard(DashboardMsg),
    /// User picked a report from the list.
    OpenReport { report_id: ReportId },
    /// A full report record arrived, either for opening or from polling.
    ReportLoaded(ReportRecord),
    ReportLoadFailed { report_id: ReportId, error: String },
    CloseReport,
    /// User asked for a new report on a design challenge.
    CreateReport { design_challenge: String },
    ReportCreated { report_id: ReportId },
    ReportCreateFailed { error: String },
    /// Save the open report to disk.
    ExportRequested,
    ExportFinished { result: Result<PathBuf, String> },
    UsageLoaded(UsageSnapshot),
    SubscriptionLoaded(Subscription),
    /// UI/render tick; drives status polling.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}

impl From<ChatMsg> for Msg {
    fn from(msg: ChatMsg) -> Self {
        Msg::Chat(msg)
    }
}

impl From<TocMsg> for Msg {
    fn from(msg: TocMsg) -> Self {
        Msg::Toc(msg)
    }
}

impl From<DashboardMsg> for Msg {
    fn from(msg: DashboardMsg) -> Self {
        Msg::Dashboard(msg)
    }
}
