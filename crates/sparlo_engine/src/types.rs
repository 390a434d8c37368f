use std::fmt;
use std::path::PathBuf;

use sparlo_core::{ReportId, ReportRecord, StreamId, Subscription, UsageSnapshot};

/// Incremental event of one chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Text(String),
    Done { saved: Option<bool> },
    Failed(ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Chat {
        stream_id: StreamId,
        event: ChatEvent,
    },
    ReportsLoaded(Result<Vec<ReportRecord>, ApiError>),
    ReportLoaded {
        report_id: ReportId,
        result: Result<ReportRecord, ApiError>,
    },
    ReportCreated(Result<ReportId, ApiError>),
    ArchiveFinished {
        report_id: ReportId,
        result: Result<(), ApiError>,
    },
    CancelFinished {
        report_id: ReportId,
        result: Result<(), ApiError>,
    },
    UsageLoaded(Result<UsageSnapshot, ApiError>),
    SubscriptionLoaded(Result<Subscription, ApiError>),
    ExportFinished {
        report_id: ReportId,
        result: Result<PathBuf, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() || self.message == self.kind.to_string() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    /// HTTP 429, with the `Retry-After` delay in seconds when the server sent one.
    RateLimited { retry_after_secs: Option<u64> },
    Timeout,
    Network,
    /// The server reported an error inside an otherwise healthy stream.
    Upstream(String),
    /// A response body could not be decoded.
    Decode,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::RateLimited {
                retry_after_secs: Some(secs),
            } => write!(f, "rate limited (retry after {secs}s)"),
            FailureKind::RateLimited {
                retry_after_secs: None,
            } => write!(f, "rate limited"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Upstream(message) => write!(f, "upstream error: {message}"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}
