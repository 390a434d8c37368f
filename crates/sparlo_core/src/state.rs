use crate::chat::{ChatContext, ChatPanel};
use crate::dashboard::{Dashboard, DashboardMsg};
use crate::notify::Notification;
use crate::render::{render_content, toc_sections};
use crate::report::{status_badge, ReportId, ReportRecord};
use crate::schema::ReportContent;
use crate::toc::TocTracker;
use crate::usage::{Subscription, UsageLevel, UsageSnapshot};
use crate::view_model::{
    AppViewModel, ChatView, DashboardView, ReportRowView, ReportView, UsageView,
};
use crate::Effect;

/// The report currently shown in the detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedReport {
    pub record: ReportRecord,
    pub content: Option<ReportContent>,
    pub markdown: String,
}

impl OpenedReport {
    fn new(record: ReportRecord) -> Self {
        let content = record.content();
        let markdown = content.as_ref().map(render_content).unwrap_or_default();
        Self {
            record,
            content,
            markdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    chat: ChatPanel,
    toc: TocTracker,
    dashboard: Dashboard,
    report: Option<OpenedReport>,
    opening: Option<ReportId>,
    usage: Option<UsageSnapshot>,
    subscription: Option<Subscription>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a TOC tracker that uses `offset` as its activation line.
    pub fn with_scroll_offset(offset: f64) -> Self {
        Self {
            toc: TocTracker::new(offset),
            ..Self::default()
        }
    }

    pub fn chat(&self) -> &ChatPanel {
        &self.chat
    }

    pub fn toc(&self) -> &TocTracker {
        &self.toc
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn opened_report(&self) -> Option<&OpenedReport> {
        self.report.as_ref()
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub(crate) fn chat_mut(&mut self) -> &mut ChatPanel {
        &mut self.chat
    }

    pub(crate) fn toc_mut(&mut self) -> &mut TocTracker {
        &mut self.toc
    }

    pub(crate) fn dashboard_mut(&mut self) -> &mut Dashboard {
        &mut self.dashboard
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        let own = std::mem::take(&mut self.dirty);
        let chat = self.chat.consume_dirty();
        let toc = self.toc.consume_dirty();
        let dashboard = self.dashboard.consume_dirty();
        own || chat || toc || dashboard
    }

    pub(crate) fn begin_open(&mut self, report_id: ReportId) -> Vec<Effect> {
        if self
            .report
            .as_ref()
            .is_some_and(|open| open.record.id == report_id)
        {
            return Vec::new();
        }
        self.opening = Some(report_id.clone());
        self.dirty = true;
        vec![Effect::LoadReport { report_id }]
    }

    pub(crate) fn apply_report(&mut self, record: ReportRecord) -> Vec<Effect> {
        let mut effects = self
            .dashboard
            .update(DashboardMsg::ReportRefreshed(record.summary()));

        let is_opening = self.opening.as_deref() == Some(record.id.as_str());
        let is_open = self
            .report
            .as_ref()
            .is_some_and(|open| open.record.id == record.id);
        if !is_opening && !is_open {
            return effects;
        }

        self.opening = None;
        let opened = OpenedReport::new(record);
        let sections = opened
            .content
            .as_ref()
            .map(toc_sections)
            .unwrap_or_default();
        if sections.as_slice() != self.toc.sections() {
            effects.extend(self.toc.set_sections(sections));
        }
        effects.extend(self.chat.set_context(ChatContext::Report {
            report_id: opened.record.id.clone(),
        }));
        self.report = Some(opened);
        self.dirty = true;
        effects
    }

    pub(crate) fn apply_load_failure(&mut self, report_id: ReportId, error: String) -> Vec<Effect> {
        let mut effects = self.dashboard.update(DashboardMsg::RefreshFailed {
            report_id: report_id.clone(),
            error: error.clone(),
        });
        if self.opening.as_deref() == Some(report_id.as_str()) {
            self.opening = None;
            self.dirty = true;
            effects.push(Effect::Notify(Notification::error(format!(
                "Could not open the report: {error}"
            ))));
        }
        effects
    }

    pub(crate) fn close_report(&mut self) -> Vec<Effect> {
        let had_report = self.report.take().is_some();
        let was_opening = self.opening.take().is_some();
        if !had_report && !was_opening {
            return Vec::new();
        }
        self.dirty = true;
        let mut effects = self.toc.set_sections(Vec::new());
        effects.extend(self.chat.set_context(ChatContext::default()));
        effects
    }

    pub(crate) fn apply_usage(&mut self, usage: UsageSnapshot) -> Vec<Effect> {
        let previous = self.usage.map(|old| old.level()).unwrap_or(UsageLevel::Normal);
        let level = usage.level();
        self.usage = Some(usage);
        self.dirty = true;
        if level <= previous {
            return Vec::new();
        }
        let text = match level {
            UsageLevel::Exceeded => "You've used all of your report tokens for this period.",
            UsageLevel::Warning => "You've used most of your report tokens for this period.",
            UsageLevel::Normal => return Vec::new(),
        };
        vec![Effect::Notify(Notification::warning(text))]
    }

    pub(crate) fn set_subscription(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
        self.dirty = true;
    }

    pub fn view(&self) -> AppViewModel {
        let dashboard = DashboardView {
            rows: self
                .dashboard
                .visible()
                .into_iter()
                .map(|report| ReportRowView {
                    id: report.id.clone(),
                    title: report.display_title().to_string(),
                    status: report.status,
                    badge: status_badge(report.status),
                    current_step: report.current_step.clone(),
                    created_at: report.created_at,
                })
                .collect(),
            query: self.dashboard.query().to_string(),
            status_filter: self.dashboard.status_filter(),
            error: self.dashboard.error().map(ToOwned::to_owned),
            loading: self.dashboard.is_loading(),
        };

        let report = self.report.as_ref().map(|open| ReportView {
            id: open.record.id.clone(),
            title: open.record.title.clone(),
            badge: status_badge(open.record.status),
            current_step: open.record.current_step.clone(),
            phase_progress: open.record.phase_progress,
            markdown: open.markdown.clone(),
            structured: open
                .content
                .as_ref()
                .is_some_and(ReportContent::is_structured),
            fallback_reason: match &open.content {
                Some(ReportContent::Markdown {
                    fallback_reason: Some(reason),
                    ..
                }) => Some(reason.to_string()),
                _ => None,
            },
            sections: self.toc.sections().to_vec(),
            active_section: self.toc.active().map(ToOwned::to_owned),
        });

        let chat = ChatView {
            open: self.chat.is_open(),
            input: self.chat.input().to_string(),
            messages: self.chat.messages().to_vec(),
            streaming: self.chat.is_streaming(),
        };

        let usage = self.usage.map(|usage| UsageView {
            percent: usage.percent_used(),
            level: usage.level(),
            tokens_used: usage.tokens_used,
            tokens_limit: usage.tokens_limit,
            reports_count: usage.reports_count,
            chat_tokens_used: usage.chat_tokens_used,
        });

        AppViewModel {
            dashboard,
            report,
            opening: self.opening.clone(),
            chat,
            usage,
        }
    }
}
