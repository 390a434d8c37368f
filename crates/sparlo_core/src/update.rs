use crate::{AppState, Effect, Msg, Notification};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Started => {
            let mut effects = state
                .dashboard_mut()
                .update(crate::DashboardMsg::Opened);
            effects.push(Effect::CheckUsage);
            effects.push(Effect::LoadSubscription);
            effects
        }
        Msg::Chat(msg) => state.chat_mut().update(msg),
        Msg::Toc(msg) => state.toc_mut().update(msg),
        Msg::Dashboard(msg) => state.dashboard_mut().update(msg),
        Msg::OpenReport { report_id } => state.begin_open(report_id),
        Msg::ReportLoaded(record) => state.apply_report(record),
        Msg::ReportLoadFailed { report_id, error } => state.apply_load_failure(report_id, error),
        Msg::CloseReport => state.close_report(),
        Msg::CreateReport { design_challenge } => {
            let design_challenge = design_challenge.trim().to_string();
            if design_challenge.is_empty() {
                Vec::new()
            } else {
                vec![Effect::CreateReport { design_challenge }]
            }
        }
        Msg::ReportCreated { report_id } => {
            let mut effects = vec![Effect::Notify(Notification::info(
                "Report started. It will appear in your list while it generates.",
            ))];
            effects.extend(state.begin_open(report_id));
            effects
        }
        Msg::ReportCreateFailed { error } => vec![Effect::Notify(Notification::error(format!(
            "Could not start the report: {error}"
        )))],
        Msg::ExportRequested => match state.opened_report() {
            Some(open) => vec![Effect::ExportReport {
                record: Box::new(open.record.clone()),
            }],
            None => Vec::new(),
        },
        Msg::ExportFinished { result } => match result {
            Ok(path) => vec![Effect::Notify(Notification::info(format!(
                "Report saved to {}",
                path.display()
            )))],
            Err(error) => vec![Effect::Notify(Notification::error(format!(
                "Could not save the report: {error}"
            )))],
        },
        Msg::UsageLoaded(usage) => state.apply_usage(usage),
        Msg::SubscriptionLoaded(subscription) => {
            state.set_subscription(subscription);
            Vec::new()
        }
        Msg::Tick => state.dashboard_mut().update(crate::DashboardMsg::Tick),
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
