use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use sparlo_core::{
    update, AppState, DashboardMsg, Effect, Msg, OptimisticState, ReportStatus, ReportSummary,
    POLL_INTERVAL_TICKS,
};

fn summary(id: &str, status: ReportStatus, headline: Option<&str>, day: u32) -> ReportSummary {
    ReportSummary {
        id: id.to_string(),
        title: String::new(),
        headline: headline.map(ToOwned::to_owned),
        status,
        current_step: None,
        created_at: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
    }
}

fn loaded(reports: Vec<ReportSummary>) -> AppState {
    let (state, effects) = update(AppState::new(), Msg::Started);
    assert!(effects.contains(&Effect::LoadReports));
    assert!(state.view().dashboard.loading);
    update(state, DashboardMsg::Loaded(reports).into()).0
}

fn visible_ids(state: &AppState) -> Vec<String> {
    state
        .view()
        .dashboard
        .rows
        .into_iter()
        .map(|row| row.id)
        .collect()
}

#[test]
fn search_matches_headline_case_insensitively() {
    let state = loaded(vec![
        summary("1", ReportStatus::Complete, Some("Cold chain"), 1),
        summary("2", ReportStatus::Processing, None, 2),
    ]);

    let (state, _) = update(state, DashboardMsg::QueryChanged("cold".to_string()).into());

    assert_eq!(visible_ids(&state), vec!["1".to_string()]);
}

#[test]
fn search_falls_back_to_title_without_headline() {
    let mut titled = summary("3", ReportStatus::Complete, None, 3);
    titled.title = "Battery Thermal Runaway".to_string();
    let state = loaded(vec![titled, summary("4", ReportStatus::Complete, Some("Other"), 4)]);

    let (state, _) = update(state, DashboardMsg::QueryChanged("THERMAL".to_string()).into());
    assert_eq!(visible_ids(&state), vec!["3".to_string()]);
}

#[test]
fn list_is_newest_first_and_status_filter_applies() {
    let state = loaded(vec![
        summary("old", ReportStatus::Complete, None, 1),
        summary("new", ReportStatus::Processing, None, 9),
        summary("mid", ReportStatus::Complete, None, 5),
    ]);
    assert_eq!(visible_ids(&state), vec!["new", "mid", "old"]);

    let (state, _) = update(
        state,
        DashboardMsg::StatusFilterChanged(Some(ReportStatus::Complete)).into(),
    );
    assert_eq!(visible_ids(&state), vec!["mid", "old"]);
}

#[test]
fn archive_hides_immediately_and_commits() {
    let state = loaded(vec![
        summary("1", ReportStatus::Complete, Some("A"), 1),
        summary("2", ReportStatus::Complete, Some("B"), 2),
    ]);

    let (state, effects) = update(
        state,
        DashboardMsg::ArchiveClicked {
            report_id: "1".to_string(),
        }
        .into(),
    );
    assert_eq!(
        effects,
        vec![Effect::ArchiveReport {
            report_id: "1".to_string()
        }]
    );
    assert_eq!(visible_ids(&state), vec!["2".to_string()]);
    assert_eq!(
        state.dashboard().change("1").map(|c| c.state),
        Some(OptimisticState::Pending)
    );

    let (state, effects) = update(
        state,
        DashboardMsg::ArchiveFinished {
            report_id: "1".to_string(),
            result: Ok(()),
        }
        .into(),
    );
    assert!(effects.is_empty());
    assert_eq!(visible_ids(&state), vec!["2".to_string()]);
    assert_eq!(
        state.dashboard().change("1").map(|c| c.state),
        Some(OptimisticState::Committed)
    );
}

#[test]
fn failed_archive_restores_row_and_shows_error() {
    let state = loaded(vec![
        summary("1", ReportStatus::Complete, Some("A"), 1),
        summary("2", ReportStatus::Complete, Some("B"), 2),
    ]);
    let (state, _) = update(
        state,
        DashboardMsg::ArchiveClicked {
            report_id: "1".to_string(),
        }
        .into(),
    );

    let (state, effects) = update(
        state,
        DashboardMsg::ArchiveFinished {
            report_id: "1".to_string(),
            result: Err("HTTP 500".to_string()),
        }
        .into(),
    );

    assert_eq!(visible_ids(&state), vec!["2".to_string(), "1".to_string()]);
    assert!(state.view().dashboard.error.unwrap().contains("HTTP 500"));
    assert!(matches!(effects.as_slice(), [Effect::Notify(_)]));
    assert_eq!(
        state.dashboard().change("1").map(|c| c.state),
        Some(OptimisticState::RolledBack)
    );
}

#[test]
fn double_archive_click_sends_one_request() {
    let state = loaded(vec![summary("1", ReportStatus::Complete, None, 1)]);
    let (state, first) = update(
        state,
        DashboardMsg::ArchiveClicked {
            report_id: "1".to_string(),
        }
        .into(),
    );
    let (_state, second) = update(
        state,
        DashboardMsg::ArchiveClicked {
            report_id: "1".to_string(),
        }
        .into(),
    );
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[test]
fn failed_cancel_restores_previous_status() {
    let state = loaded(vec![summary("1", ReportStatus::Processing, None, 1)]);
    let (state, effects) = update(
        state,
        DashboardMsg::CancelClicked {
            report_id: "1".to_string(),
        }
        .into(),
    );
    assert_eq!(
        effects,
        vec![Effect::CancelReport {
            report_id: "1".to_string()
        }]
    );
    assert_eq!(state.view().dashboard.rows[0].status, ReportStatus::Cancelled);

    let (state, _) = update(
        state,
        DashboardMsg::CancelFinished {
            report_id: "1".to_string(),
            result: Err("network".to_string()),
        }
        .into(),
    );
    assert_eq!(state.view().dashboard.rows[0].status, ReportStatus::Processing);
    assert!(state.view().dashboard.error.is_some());
}

#[test]
fn completed_report_cannot_be_cancelled() {
    let state = loaded(vec![summary("1", ReportStatus::Complete, None, 1)]);
    let (_state, effects) = update(
        state,
        DashboardMsg::CancelClicked {
            report_id: "1".to_string(),
        }
        .into(),
    );
    assert!(effects.is_empty());
}

#[test]
fn active_reports_are_polled_once_per_interval() {
    let mut state = loaded(vec![
        summary("busy", ReportStatus::Processing, None, 2),
        summary("done", ReportStatus::Complete, None, 1),
    ]);

    let mut effects = Vec::new();
    for _ in 0..POLL_INTERVAL_TICKS {
        let (next, tick_effects) = update(state, Msg::Tick);
        state = next;
        effects.extend(tick_effects);
    }
    assert_eq!(
        effects,
        vec![Effect::RefreshReport {
            report_id: "busy".to_string()
        }]
    );

    // Still refreshing: the next interval does not pile up another request.
    let mut effects = Vec::new();
    for _ in 0..POLL_INTERVAL_TICKS {
        let (next, tick_effects) = update(state, Msg::Tick);
        state = next;
        effects.extend(tick_effects);
    }
    assert!(effects.is_empty());
}

#[test]
fn filtered_out_reports_are_still_polled() {
    let state = loaded(vec![
        summary("busy", ReportStatus::Processing, Some("Heat pipes"), 2),
        summary("done", ReportStatus::Complete, Some("Cold chain"), 1),
    ]);
    let (state, _) = update(
        state,
        DashboardMsg::StatusFilterChanged(Some(ReportStatus::Complete)).into(),
    );
    let (mut state, _) = update(state, DashboardMsg::QueryChanged("cold".to_string()).into());
    assert_eq!(visible_ids(&state), vec!["done".to_string()]);

    let mut effects = Vec::new();
    for _ in 0..POLL_INTERVAL_TICKS {
        let (next, tick_effects) = update(state, Msg::Tick);
        state = next;
        effects.extend(tick_effects);
    }
    assert_eq!(
        effects,
        vec![Effect::RefreshReport {
            report_id: "busy".to_string()
        }]
    );
}
