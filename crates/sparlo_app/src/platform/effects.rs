use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use sparlo_core::{AppEvent, ChatFailure, ChatMsg, DashboardMsg, Effect, EventBus, Msg};
use sparlo_engine::{ApiError, ChatEvent, EngineEvent, EngineHandle, FailureKind};
use sparlo_logging::{sparlo_debug, sparlo_info, sparlo_warn};

/// Runs effects that need IO or app-wide broadcast; hands the rest back to the shell.
pub struct EffectRunner {
    engine: EngineHandle,
    bus: EventBus,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, bus: EventBus, msg_tx: mpsc::Sender<Msg>) -> Self {
        let runner = Self { engine, bus };
        runner.spawn_event_loop(msg_tx);
        runner
    }

    /// Returns the effects that belong to the view.
    pub fn enqueue(&self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut view_effects = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartChatStream { stream_id, request } => {
                    sparlo_info!(
                        "StartChatStream stream_id={} message_len={}",
                        stream_id,
                        request.message().len()
                    );
                    self.engine.start_chat(stream_id, request);
                }
                Effect::CancelChatStream { stream_id } => self.engine.cancel_chat(stream_id),
                Effect::LoadReports => self.engine.load_reports(),
                Effect::CreateReport { design_challenge } => {
                    self.engine.create_report(design_challenge)
                }
                Effect::LoadReport { report_id } | Effect::RefreshReport { report_id } => {
                    self.engine.load_report(report_id)
                }
                Effect::ArchiveReport { report_id } => self.engine.archive_report(report_id),
                Effect::CancelReport { report_id } => self.engine.cancel_report(report_id),
                Effect::ExportReport { record } => self.engine.export_report(*record),
                Effect::CheckUsage => self.engine.check_usage(),
                Effect::LoadSubscription => self.engine.load_subscription(),
                Effect::Notify(notification) => {
                    self.bus.publish(AppEvent::Notification(notification));
                }
                Effect::ActiveSectionChanged { section_id } => {
                    self.bus.publish(AppEvent::ActiveSectionChanged { section_id });
                }
                view @ (Effect::ScrollMessagesToBottom
                | Effect::AttachScrollListener
                | Effect::DetachScrollListener
                | Effect::RequestAnimationFrame
                | Effect::SmoothScrollTo { .. }) => view_effects.push(view),
            }
        }
        view_effects
    }

    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let engine = self.engine.clone();
        let bus = self.bus.clone();
        thread::spawn(move || loop {
            let Some(event) = engine.recv_timeout(Duration::from_millis(50)) else {
                continue;
            };
            publish_outcome(&bus, &event);
            if let Some(msg) = map_engine_event(event) {
                if msg_tx.send(msg).is_err() {
                    sparlo_debug!("Shell is gone; stopping engine event loop");
                    break;
                }
            }
        });
    }
}

fn publish_outcome(bus: &EventBus, event: &EngineEvent) {
    if let EngineEvent::ArchiveFinished { report_id, result } = event {
        let event = match result {
            Ok(()) => AppEvent::ReportArchived {
                report_id: report_id.clone(),
            },
            Err(_) => AppEvent::ReportRestored {
                report_id: report_id.clone(),
            },
        };
        bus.publish(event);
    }
}

/// Translates an engine event into the message the core expects, if any.
pub fn map_engine_event(event: EngineEvent) -> Option<Msg> {
    let msg: Msg = match event {
        EngineEvent::Chat { stream_id, event } => match event {
            ChatEvent::Text(text) => ChatMsg::StreamText { stream_id, text }.into(),
            ChatEvent::Done { saved } => ChatMsg::StreamDone { stream_id, saved }.into(),
            ChatEvent::Failed(err) if err.is_cancelled() => {
                sparlo_debug!("Chat stream {} stopped after cancel", stream_id);
                return None;
            }
            ChatEvent::Failed(err) => ChatMsg::StreamFailed {
                stream_id,
                failure: map_failure(err),
            }
            .into(),
        },
        EngineEvent::ReportsLoaded(Ok(records)) => {
            DashboardMsg::Loaded(records.iter().map(|record| record.summary()).collect()).into()
        }
        EngineEvent::ReportsLoaded(Err(err)) => DashboardMsg::LoadFailed(err.to_string()).into(),
        EngineEvent::ReportLoaded {
            result: Ok(record), ..
        } => Msg::ReportLoaded(record),
        EngineEvent::ReportLoaded {
            report_id,
            result: Err(err),
        } => Msg::ReportLoadFailed {
            report_id,
            error: err.to_string(),
        },
        EngineEvent::ReportCreated(Ok(report_id)) => Msg::ReportCreated { report_id },
        EngineEvent::ReportCreated(Err(err)) => Msg::ReportCreateFailed {
            error: err.to_string(),
        },
        EngineEvent::ArchiveFinished { report_id, result } => DashboardMsg::ArchiveFinished {
            report_id,
            result: result.map_err(|err| err.to_string()),
        }
        .into(),
        EngineEvent::CancelFinished { report_id, result } => DashboardMsg::CancelFinished {
            report_id,
            result: result.map_err(|err| err.to_string()),
        }
        .into(),
        EngineEvent::UsageLoaded(Ok(usage)) => Msg::UsageLoaded(usage),
        EngineEvent::SubscriptionLoaded(Ok(subscription)) => Msg::SubscriptionLoaded(subscription),
        EngineEvent::UsageLoaded(Err(err)) | EngineEvent::SubscriptionLoaded(Err(err)) => {
            sparlo_warn!("Account lookup failed: {}", err);
            return None;
        }
        EngineEvent::ExportFinished { result, .. } => Msg::ExportFinished { result },
    };
    Some(msg)
}

fn map_failure(err: ApiError) -> ChatFailure {
    match err.kind {
        FailureKind::RateLimited { retry_after_secs } => ChatFailure::RateLimited { retry_after_secs },
        FailureKind::HttpStatus(code) => ChatFailure::HttpStatus(code),
        FailureKind::Upstream(message) => ChatFailure::Upstream(message),
        FailureKind::Cancelled => ChatFailure::Cancelled,
        FailureKind::InvalidUrl
        | FailureKind::Timeout
        | FailureKind::Network
        | FailureKind::Decode => ChatFailure::Network(err.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failed(kind: FailureKind, message: &str) -> EngineEvent {
        EngineEvent::Chat {
            stream_id: 4,
            event: ChatEvent::Failed(ApiError {
                kind,
                message: message.into(),
            }),
        }
    }

    #[test]
    fn rate_limit_keeps_retry_after() {
        let msg = map_engine_event(failed(
            FailureKind::RateLimited {
                retry_after_secs: Some(120),
            },
            "429",
        ));
        let Some(Msg::Chat(ChatMsg::StreamFailed { stream_id, failure })) = msg else {
            panic!("expected a stream failure");
        };
        assert_eq!(stream_id, 4);
        assert!(failure.user_message().contains("2 minutes"));
    }

    #[test]
    fn cancelled_streams_are_not_reported() {
        assert_eq!(map_engine_event(failed(FailureKind::Cancelled, "cancelled")), None);
    }

    #[test]
    fn transport_failures_become_network_errors() {
        assert_eq!(
            map_engine_event(failed(FailureKind::Timeout, "read timed out")),
            Some(Msg::Chat(ChatMsg::StreamFailed {
                stream_id: 4,
                failure: ChatFailure::Network("read timed out".into()),
            }))
        );
    }

    #[test]
    fn archive_failure_is_restored_on_the_bus() {
        let bus = EventBus::new();
        let listener = bus.subscribe();
        let event = EngineEvent::ArchiveFinished {
            report_id: "a".into(),
            result: Err(ApiError {
                kind: FailureKind::HttpStatus(500),
                message: "boom".into(),
            }),
        };
        publish_outcome(&bus, &event);
        assert_eq!(
            listener.try_recv(),
            Some(AppEvent::ReportRestored {
                report_id: "a".into()
            })
        );
        assert_eq!(
            map_engine_event(event),
            Some(Msg::Dashboard(DashboardMsg::ArchiveFinished {
                report_id: "a".into(),
                result: Err("http status 500: boom".into()),
            }))
        );
    }
}
