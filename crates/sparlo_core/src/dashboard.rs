//! Report list with client-side filtering and optimistic archive/cancel.

use std::collections::{BTreeMap, BTreeSet};

use sparlo_logging::sparlo_warn;

use crate::notify::Notification;
use crate::report::{ReportId, ReportStatus, ReportSummary};
use crate::Effect;

/// Ticks between status polls of in-flight reports.
pub const POLL_INTERVAL_TICKS: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimisticState {
    Pending,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimisticAction {
    Archive,
    Cancel { previous: ReportStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingChange {
    pub action: OptimisticAction,
    pub state: OptimisticState,
}

impl PendingChange {
    fn hides_row(&self) -> bool {
        self.action == OptimisticAction::Archive && self.state != OptimisticState::RolledBack
    }

    fn is_pending(&self) -> bool {
        self.state == OptimisticState::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardMsg {
    Opened,
    Loaded(Vec<ReportSummary>),
    LoadFailed(String),
    QueryChanged(String),
    StatusFilterChanged(Option<ReportStatus>),
    ArchiveClicked { report_id: ReportId },
    ArchiveFinished {
        report_id: ReportId,
        result: Result<(), String>,
    },
    CancelClicked { report_id: ReportId },
    CancelFinished {
        report_id: ReportId,
        result: Result<(), String>,
    },
    ReportRefreshed(ReportSummary),
    RefreshFailed { report_id: ReportId, error: String },
    ErrorDismissed,
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dashboard {
    reports: Vec<ReportSummary>,
    query: String,
    status_filter: Option<ReportStatus>,
    changes: BTreeMap<ReportId, PendingChange>,
    error: Option<String>,
    loading: bool,
    ticks_since_poll: u32,
    refreshing: BTreeSet<ReportId>,
    dirty: bool,
}

/// Case-insensitive substring match on the headline, or the title when there is none.
pub fn matches_query(report: &ReportSummary, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let haystack = match report.headline.as_deref() {
        Some(headline) => headline,
        None => &report.title,
    };
    haystack.to_lowercase().contains(&needle)
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status_filter(&self) -> Option<ReportStatus> {
        self.status_filter
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn change(&self, report_id: &str) -> Option<PendingChange> {
        self.changes.get(report_id).copied()
    }

    pub fn find(&self, report_id: &str) -> Option<&ReportSummary> {
        self.reports.iter().find(|report| report.id == report_id)
    }

    /// Reports after optimistic hiding, status filter and text query.
    pub fn visible(&self) -> Vec<&ReportSummary> {
        self.reports
            .iter()
            .filter(|report| !self.is_hidden(report))
            .filter(|report| self.status_filter.map_or(true, |status| report.status == status))
            .filter(|report| matches_query(report, &self.query))
            .collect()
    }

    fn is_hidden(&self, report: &ReportSummary) -> bool {
        self.changes
            .get(&report.id)
            .is_some_and(PendingChange::hides_row)
    }

    pub(crate) fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn update(&mut self, msg: DashboardMsg) -> Vec<Effect> {
        match msg {
            DashboardMsg::Opened => {
                self.loading = true;
                self.dirty = true;
                vec![Effect::LoadReports]
            }
            DashboardMsg::Loaded(reports) => {
                self.replace_reports(reports);
                self.loading = false;
                self.dirty = true;
                Vec::new()
            }
            DashboardMsg::LoadFailed(error) => {
                self.loading = false;
                self.error = Some(format!("Could not load reports: {error}"));
                self.dirty = true;
                Vec::new()
            }
            DashboardMsg::QueryChanged(query) => {
                self.query = query;
                self.dirty = true;
                Vec::new()
            }
            DashboardMsg::StatusFilterChanged(filter) => {
                self.status_filter = filter;
                self.dirty = true;
                Vec::new()
            }
            DashboardMsg::ArchiveClicked { report_id } => self.begin_archive(report_id),
            DashboardMsg::ArchiveFinished { report_id, result } => {
                self.finish(report_id, result, "archive")
            }
            DashboardMsg::CancelClicked { report_id } => self.begin_cancel(report_id),
            DashboardMsg::CancelFinished { report_id, result } => {
                self.finish(report_id, result, "cancel")
            }
            DashboardMsg::ReportRefreshed(summary) => {
                self.refreshing.remove(&summary.id);
                self.upsert(summary);
                self.dirty = true;
                Vec::new()
            }
            DashboardMsg::RefreshFailed { report_id, error } => {
                sparlo_warn!("Refreshing report {} failed: {}", report_id, error);
                self.refreshing.remove(&report_id);
                Vec::new()
            }
            DashboardMsg::ErrorDismissed => {
                if self.error.take().is_some() {
                    self.dirty = true;
                }
                Vec::new()
            }
            DashboardMsg::Tick => self.poll(),
        }
    }

    fn begin_archive(&mut self, report_id: ReportId) -> Vec<Effect> {
        if self.find(&report_id).is_none() || self.has_pending(&report_id) {
            return Vec::new();
        }
        if self
            .changes
            .get(&report_id)
            .is_some_and(PendingChange::hides_row)
        {
            return Vec::new();
        }
        self.changes.insert(
            report_id.clone(),
            PendingChange {
                action: OptimisticAction::Archive,
                state: OptimisticState::Pending,
            },
        );
        self.dirty = true;
        vec![Effect::ArchiveReport { report_id }]
    }

    fn begin_cancel(&mut self, report_id: ReportId) -> Vec<Effect> {
        if self.has_pending(&report_id) {
            return Vec::new();
        }
        let Some(report) = self.reports.iter_mut().find(|report| report.id == report_id) else {
            return Vec::new();
        };
        if !report.status.is_active() {
            return Vec::new();
        }
        let previous = report.status;
        report.status = ReportStatus::Cancelled;
        self.changes.insert(
            report_id.clone(),
            PendingChange {
                action: OptimisticAction::Cancel { previous },
                state: OptimisticState::Pending,
            },
        );
        self.dirty = true;
        vec![Effect::CancelReport { report_id }]
    }

    fn finish(&mut self, report_id: ReportId, result: Result<(), String>, verb: &str) -> Vec<Effect> {
        let Some(change) = self.changes.get_mut(&report_id) else {
            return Vec::new();
        };
        if !change.is_pending() {
            return Vec::new();
        }
        self.dirty = true;
        match result {
            Ok(()) => {
                change.state = OptimisticState::Committed;
                Vec::new()
            }
            Err(error) => {
                change.state = OptimisticState::RolledBack;
                if let OptimisticAction::Cancel { previous } = change.action {
                    if let Some(report) =
                        self.reports.iter_mut().find(|report| report.id == report_id)
                    {
                        report.status = previous;
                    }
                }
                sparlo_warn!("Optimistic {} of {} rolled back: {}", verb, report_id, error);
                let text = format!("Could not {verb} the report: {error}");
                self.error = Some(text.clone());
                vec![Effect::Notify(Notification::error(text))]
            }
        }
    }

    fn has_pending(&self, report_id: &str) -> bool {
        self.changes
            .get(report_id)
            .is_some_and(PendingChange::is_pending)
    }

    fn replace_reports(&mut self, mut reports: Vec<ReportSummary>) {
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for report in &mut reports {
            self.apply_cancel_override(report);
        }
        let ids: BTreeSet<&ReportId> = reports.iter().map(|report| &report.id).collect();
        self.changes
            .retain(|id, change| change.is_pending() || ids.contains(id));
        self.refreshing.retain(|id| ids.contains(id));
        self.reports = reports;
    }

    fn upsert(&mut self, mut summary: ReportSummary) {
        self.apply_cancel_override(&mut summary);
        match self.reports.iter_mut().find(|report| report.id == summary.id) {
            Some(existing) => *existing = summary,
            None => {
                self.reports.push(summary);
                self.reports
                    .sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
        }
    }

    /// A pending cancel wins over whatever status the server last reported.
    fn apply_cancel_override(&self, report: &mut ReportSummary) {
        if let Some(change) = self.changes.get(&report.id) {
            if change.is_pending() && matches!(change.action, OptimisticAction::Cancel { .. }) {
                report.status = ReportStatus::Cancelled;
            }
        }
    }

    fn poll(&mut self) -> Vec<Effect> {
        self.ticks_since_poll += 1;
        if self.ticks_since_poll < POLL_INTERVAL_TICKS {
            return Vec::new();
        }
        self.ticks_since_poll = 0;

        // Search and status filters only shape the view; hidden rows still
        // need refreshing so they can move into it.
        let due: Vec<ReportId> = self
            .reports
            .iter()
            .filter(|report| !self.is_hidden(report))
            .filter(|report| report.status.is_active())
            .filter(|report| !self.refreshing.contains(&report.id))
            .map(|report| report.id.clone())
            .collect();

        due.into_iter()
            .map(|report_id| {
                self.refreshing.insert(report_id.clone());
                Effect::RefreshReport { report_id }
            })
            .collect()
    }
}
