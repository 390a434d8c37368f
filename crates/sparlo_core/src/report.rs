use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::schema::ReportContent;

pub type ReportId = String;

/// Lifecycle status of a report as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Processing,
    Clarifying,
    Complete,
    Failed,
    Cancelled,
    Error,
    ConfirmRerun,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 7] = [
        ReportStatus::Processing,
        ReportStatus::Clarifying,
        ReportStatus::Complete,
        ReportStatus::Failed,
        ReportStatus::Cancelled,
        ReportStatus::Error,
        ReportStatus::ConfirmRerun,
    ];

    /// The pipeline will not move this report any further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReportStatus::Complete
                | ReportStatus::Failed
                | ReportStatus::Cancelled
                | ReportStatus::Error
        )
    }

    /// The report is still owned by the generation pipeline and worth polling.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Processing => "processing",
            ReportStatus::Clarifying => "clarifying",
            ReportStatus::Complete => "complete",
            ReportStatus::Failed => "failed",
            ReportStatus::Cancelled => "cancelled",
            ReportStatus::Error => "error",
            ReportStatus::ConfirmRerun => "confirm_rerun",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
}

/// A report row as persisted by the backend.
///
/// Accepts both the snake_case row shape and the camelCase shape the status
/// endpoints return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: ReportId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub status: ReportStatus,
    #[serde(default, alias = "currentStep")]
    pub current_step: Option<String>,
    /// Pipeline progress within the current step, 0-100.
    #[serde(default, alias = "phaseProgress", deserialize_with = "lenient_percent")]
    pub phase_progress: Option<u8>,
    #[serde(default, alias = "reportData")]
    pub report_data: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clarifications: Vec<Clarification>,
    #[serde(default, alias = "lastMessage")]
    pub last_message: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ReportRecord {
    /// Parses `report_data`, falling back to markdown when it does not validate.
    pub fn content(&self) -> Option<ReportContent> {
        self.report_data.as_ref().map(ReportContent::from_report_data)
    }

    pub fn summary(&self) -> ReportSummary {
        let headline = self.content().and_then(|content| content.headline());
        ReportSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            headline,
            status: self.status,
            current_step: self.current_step.clone(),
            created_at: self.created_at,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Any JSON number is rounded and clamped to 0-100; anything else reads as unknown.
fn lenient_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|percent| percent.is_finite())
        .map(|percent| percent.round().clamp(0.0, 100.0) as u8))
}

/// Response of the report-creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedReport {
    #[serde(rename = "reportId")]
    pub report_id: ReportId,
}

/// The slice of a report the dashboard list needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: ReportId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub headline: Option<String>,
    pub status: ReportStatus,
    #[serde(default)]
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReportSummary {
    /// The text shown as the row title: headline when known, else title.
    pub fn display_title(&self) -> &str {
        match self.headline.as_deref() {
            Some(headline) if !headline.trim().is_empty() => headline,
            _ => &self.title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Neutral,
    InProgress,
    Attention,
    Success,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

/// Fixed lookup from status to its list badge.
pub fn status_badge(status: ReportStatus) -> StatusBadge {
    let (label, tone) = match status {
        ReportStatus::Processing => ("Processing", BadgeTone::InProgress),
        ReportStatus::Clarifying => ("Needs input", BadgeTone::Attention),
        ReportStatus::ConfirmRerun => ("Confirm rerun", BadgeTone::Attention),
        ReportStatus::Complete => ("Complete", BadgeTone::Success),
        ReportStatus::Failed => ("Failed", BadgeTone::Danger),
        ReportStatus::Error => ("Error", BadgeTone::Danger),
        ReportStatus::Cancelled => ("Cancelled", BadgeTone::Neutral),
    };
    StatusBadge { label, tone }
}
