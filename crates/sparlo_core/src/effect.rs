use crate::chat::{ChatRequest, StreamId};
use crate::notify::Notification;
use crate::report::{ReportId, ReportRecord};

/// Side effects requested by [`crate::update`]; the host executes them.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartChatStream {
        stream_id: StreamId,
        request: ChatRequest,
    },
    CancelChatStream {
        stream_id: StreamId,
    },
    ScrollMessagesToBottom,
    AttachScrollListener,
    DetachScrollListener,
    /// Ask the host for one animation frame with fresh section measurements.
    RequestAnimationFrame,
    SmoothScrollTo {
        section_id: String,
        top: f64,
    },
    ActiveSectionChanged {
        section_id: String,
    },
    LoadReports,
    CreateReport {
        design_challenge: String,
    },
    LoadReport {
        report_id: ReportId,
    },
    RefreshReport {
        report_id: ReportId,
    },
    ArchiveReport {
        report_id: ReportId,
    },
    CancelReport {
        report_id: ReportId,
    },
    ExportReport {
        record: Box<ReportRecord>,
    },
    CheckUsage,
    LoadSubscription,
    Notify(Notification),
}
