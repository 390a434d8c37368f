use std::fmt::Write;

use sparlo_core::{
    AppEvent, AppViewModel, BadgeTone, ChatView, DashboardView, Notification, NotificationLevel,
    ReportView, Role, TocSection, UsageLevel, UsageView,
};

const CHAT_TAIL: usize = 6;

pub fn render(view: &AppViewModel) -> String {
    let mut out = String::new();
    out.push_str(&render_dashboard(&view.dashboard));
    if let Some(usage) = &view.usage {
        out.push_str(&render_usage(usage));
    }
    if let Some(report_id) = &view.opening {
        let _ = writeln!(out, "Opening report {report_id}...");
    }
    if let Some(report) = &view.report {
        out.push_str(&render_report_header(report));
    }
    out.push_str(&render_chat(&view.chat));
    out
}

pub fn render_dashboard(dashboard: &DashboardView) -> String {
    let mut out = String::new();
    let mut heading = String::from("== Reports");
    if !dashboard.query.is_empty() {
        let _ = write!(heading, " | search: {:?}", dashboard.query);
    }
    if let Some(status) = dashboard.status_filter {
        let _ = write!(heading, " | status: {}", status.as_str());
    }
    if dashboard.loading {
        heading.push_str(" | loading...");
    }
    let _ = writeln!(out, "{heading}");

    if let Some(error) = &dashboard.error {
        let _ = writeln!(out, "  ! {error}");
    }
    if dashboard.rows.is_empty() && !dashboard.loading {
        out.push_str("  (no reports)\n");
    }
    for (index, row) in dashboard.rows.iter().enumerate() {
        let _ = write!(
            out,
            "  {:>2}. {} {}",
            index + 1,
            badge(row.badge.label, row.badge.tone),
            row.title
        );
        if let Some(step) = &row.current_step {
            let _ = write!(out, " ({step})");
        }
        let _ = writeln!(out, "  {}", row.created_at.format("%Y-%m-%d"));
    }
    out
}

pub fn render_usage(usage: &UsageView) -> String {
    let marker = match usage.level {
        UsageLevel::Normal => "",
        UsageLevel::Warning => " (running low)",
        UsageLevel::Exceeded => " (limit reached)",
    };
    format!(
        "Usage: {}% of {} tokens{marker} | {} reports\n",
        usage.percent, usage.tokens_limit, usage.reports_count
    )
}

pub fn render_report_header(report: &ReportView) -> String {
    let mut out = String::new();
    let _ = write!(out, "== {} {}", badge(report.badge.label, report.badge.tone), report.title);
    if let Some(step) = &report.current_step {
        let _ = write!(out, " | {step}");
    }
    if let Some(progress) = report.phase_progress {
        let _ = write!(out, " {progress}%");
    }
    out.push('\n');
    if let Some(reason) = &report.fallback_reason {
        let _ = writeln!(out, "  (shown as plain markdown: {reason})");
    }
    out.push_str(&render_toc(&report.sections, report.active_section.as_deref()));
    out
}

pub fn render_toc(sections: &[TocSection], active: Option<&str>) -> String {
    let mut out = String::new();
    write_toc(&mut out, sections, active, 1);
    out
}

fn write_toc(out: &mut String, sections: &[TocSection], active: Option<&str>, depth: usize) {
    for section in sections {
        let marker = if active == Some(section.id.as_str()) { ">" } else { " " };
        let _ = writeln!(
            out,
            "{marker}{}{} [{}]",
            "  ".repeat(depth),
            section.title,
            section.id
        );
        write_toc(out, &section.subsections, active, depth + 1);
    }
}

pub fn render_chat(chat: &ChatView) -> String {
    if !chat.open {
        return String::new();
    }
    let mut out = String::from("== Chat\n");
    let skip = chat.messages.len().saturating_sub(CHAT_TAIL);
    for message in &chat.messages[skip..] {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "sparlo",
        };
        let _ = write!(out, "  {who}: {}", message.content);
        if message.is_streaming {
            out.push_str(" ...");
        }
        if message.cancelled {
            out.push_str(" [cancelled]");
        }
        if let Some(error) = &message.error {
            let _ = write!(out, " [error: {error}]");
        }
        out.push('\n');
    }
    if !chat.input.is_empty() {
        let _ = writeln!(out, "  > {}", chat.input);
    }
    out
}

pub fn render_notification(notification: &Notification) -> String {
    let tag = match notification.level {
        NotificationLevel::Info => "info",
        NotificationLevel::Warning => "warn",
        NotificationLevel::Error => "error",
    };
    format!("[{tag}] {}", notification.text)
}

/// One line for a bus event, or `None` for events the shell does not show.
pub fn render_event(event: &AppEvent) -> Option<String> {
    match event {
        AppEvent::Notification(notification) => Some(render_notification(notification)),
        AppEvent::ActiveSectionChanged { section_id } => Some(format!("-> {section_id}")),
        AppEvent::ReportArchived { report_id } => Some(format!("[info] Archived {report_id}")),
        AppEvent::ReportRestored { report_id } => Some(format!("[info] Restored {report_id}")),
        AppEvent::CheckoutStarted { .. } | AppEvent::CheckoutCompleted { .. } => None,
    }
}

fn badge(label: &str, tone: BadgeTone) -> String {
    let mark = match tone {
        BadgeTone::Neutral => ' ',
        BadgeTone::InProgress => '~',
        BadgeTone::Attention => '?',
        BadgeTone::Success => '+',
        BadgeTone::Danger => '!',
    };
    format!("[{mark}{label}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use sparlo_core::{status_badge, ChatMessage, ReportRowView, ReportStatus};

    #[test]
    fn dashboard_rows_are_numbered_with_badges() {
        let view = DashboardView {
            rows: vec![ReportRowView {
                id: "a".into(),
                title: "Passive cooling".into(),
                status: ReportStatus::Processing,
                badge: status_badge(ReportStatus::Processing),
                current_step: Some("analysis".into()),
                created_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            }],
            query: "cool".into(),
            status_filter: None,
            error: Some("Could not archive".into()),
            loading: false,
        };
        assert_eq!(
            render_dashboard(&view),
            "== Reports | search: \"cool\"\n  ! Could not archive\n   1. [~Processing] Passive cooling (analysis)  2026-03-01\n"
        );
    }

    #[test]
    fn toc_marks_the_active_section() {
        let mut concepts = TocSection::new("solution-concepts", "Solution Concepts");
        concepts.subsections.push(TocSection::new("concept-1", "Fins"));
        let toc = render_toc(&[TocSection::new("brief", "Brief"), concepts], Some("concept-1"));
        assert_eq!(
            toc,
            "   Brief [brief]\n   Solution Concepts [solution-concepts]\n>    Fins [concept-1]\n"
        );
    }

    #[test]
    fn chat_shows_flags_and_hides_when_closed() {
        let mut chat = ChatView {
            open: true,
            input: String::new(),
            messages: vec![ChatMessage {
                role: Role::Assistant,
                content: "Hel".into(),
                is_streaming: false,
                cancelled: true,
                error: None,
            }],
            streaming: false,
        };
        assert_eq!(render_chat(&chat), "== Chat\n  sparlo: Hel [cancelled]\n");
        chat.open = false;
        assert_eq!(render_chat(&chat), "");
    }

    #[test]
    fn notifications_carry_their_level() {
        assert_eq!(
            render_notification(&Notification::warning("not saved")),
            "[warn] not saved"
        );
        assert_eq!(
            render_event(&AppEvent::CheckoutStarted { plan: "pro".into() }),
            None
        );
    }
}
