use std::path::PathBuf;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::json;
use sparlo_core::ChatRequest;
use sparlo_engine::{ChatEvent, ClientSettings, EngineConfig, EngineEvent, EngineHandle};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine(server: &MockServer, export_dir: PathBuf) -> EngineHandle {
    let settings = ClientSettings {
        base_url: server.uri(),
        ..ClientSettings::default()
    };
    EngineHandle::new(EngineConfig::new(settings, export_dir)).expect("engine starts")
}

/// Collects events until `done` matches one or the deadline passes.
fn collect_until(
    engine: &EngineHandle,
    done: impl Fn(&EngineEvent) -> bool,
) -> Vec<EngineEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(50)) {
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
    }
    events
}

fn is_chat_end(event: &EngineEvent) -> bool {
    matches!(
        event,
        EngineEvent::Chat {
            event: ChatEvent::Done { .. } | ChatEvent::Failed(_),
            ..
        }
    )
}

fn question() -> ChatRequest {
    ChatRequest::Standalone {
        message: "hi".into(),
        mode: "default".into(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chat_text_then_done_reach_the_event_queue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data:{\"text\":\"Hel\"}\ndata:{\"text\":\"lo\"}\ndata:{\"done\":true,\"saved\":true}\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let engine = engine(&server, temp.path().to_path_buf());
    engine.start_chat(3, question());

    let events = collect_until(&engine, is_chat_end);
    assert_eq!(
        events,
        vec![
            EngineEvent::Chat {
                stream_id: 3,
                event: ChatEvent::Text("Hel".into())
            },
            EngineEvent::Chat {
                stream_id: 3,
                event: ChatEvent::Text("lo".into())
            },
            EngineEvent::Chat {
                stream_id: 3,
                event: ChatEvent::Done { saved: Some(true) }
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_right_after_start_ends_the_stream_as_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: {\"text\":\"late\"}\n", "text/event-stream")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let engine = engine(&server, temp.path().to_path_buf());
    engine.start_chat(1, question());
    engine.cancel_chat(1);

    let events = collect_until(&engine, is_chat_end);
    assert_eq!(events.len(), 1);
    match &events[0] {
        EngineEvent::Chat {
            stream_id: 1,
            event: ChatEvent::Failed(err),
        } => assert!(err.is_cancelled()),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn load_then_export_writes_the_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/reports/rep-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rep-1",
            "title": "Cooling",
            "status": "complete",
            "created_at": "2026-03-01T12:00:00Z",
            "report_data": { "markdown": "## Result\n\nFins." }
        })))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let engine = engine(&server, temp.path().join("exports"));
    engine.load_report("rep-1".into());
    let events = collect_until(&engine, |e| matches!(e, EngineEvent::ReportLoaded { .. }));
    let record = match events.last() {
        Some(EngineEvent::ReportLoaded { result: Ok(record), .. }) => record.clone(),
        other => panic!("report not loaded: {other:?}"),
    };

    engine.export_report(record);
    let events = collect_until(&engine, |e| matches!(e, EngineEvent::ExportFinished { .. }));
    match events.last() {
        Some(EngineEvent::ExportFinished {
            report_id,
            result: Ok(path),
        }) => {
            assert_eq!(report_id, "rep-1");
            let written = std::fs::read_to_string(path).unwrap();
            assert!(written.contains("Fins."));
        }
        other => panic!("export did not finish: {other:?}"),
    }
}
