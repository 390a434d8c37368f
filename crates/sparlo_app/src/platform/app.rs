use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use sparlo_core::{
    update, AppState, ChatMsg, DashboardMsg, Effect, EventBus, Listener, Msg, TocMsg,
};
use sparlo_engine::{EngineConfig, EngineHandle};
use sparlo_logging::{sparlo_debug, sparlo_info};

use super::commands::{self, Command};
use super::config::AppConfig;
use super::effects::EffectRunner;
use super::ui::layout::{ReportViewport, LINE_HEIGHT};
use super::ui::render;

pub fn run_app() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    sparlo_logging::initialize(config.log_target.into(), config.log_level()?);
    sparlo_info!("Starting against {}", config.base_url);

    let engine = EngineHandle::new(EngineConfig::new(
        config.client_settings(),
        config.export_dir.clone(),
    ))
    .context("starting the engine")?;

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let (line_tx, line_rx) = mpsc::channel::<String>();

    let bus = EventBus::new();
    let listener = bus.subscribe();
    let runner = EffectRunner::new(engine, bus, msg_tx.clone());

    // Background tick drives polling and throttles rendering.
    let tick_tx = msg_tx.clone();
    let interval = config.tick_interval();
    thread::spawn(move || {
        while tick_tx.send(Msg::Tick).is_ok() {
            thread::sleep(interval);
        }
    });

    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("{}", commands::HELP);
    let mut shell = Shell {
        state: AppState::with_scroll_offset(config.scroll_offset),
        runner,
        listener,
        viewport: ReportViewport::default(),
        msg_tx,
        pending_render: false,
    };
    shell.dispatch(Msg::Started);
    shell.run(msg_rx, line_rx)
}

struct Shell {
    state: AppState,
    runner: EffectRunner,
    listener: Listener,
    viewport: ReportViewport,
    msg_tx: mpsc::Sender<Msg>,
    pending_render: bool,
}

impl Shell {
    fn run(
        &mut self,
        msg_rx: mpsc::Receiver<Msg>,
        line_rx: mpsc::Receiver<String>,
    ) -> anyhow::Result<()> {
        loop {
            loop {
                match line_rx.try_recv() {
                    Ok(line) => {
                        if !self.handle_line(&line) {
                            return Ok(());
                        }
                    }
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => {
                        sparlo_info!("Input closed; exiting");
                        return Ok(());
                    }
                }
            }

            match msg_rx.recv_timeout(Duration::from_millis(20)) {
                Ok(Msg::Tick) => {
                    self.dispatch(Msg::Tick);
                    if std::mem::take(&mut self.pending_render) {
                        print!("{}", render::render(&self.state.view()));
                    }
                }
                Ok(msg) => self.dispatch(msg),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }

            for event in self.listener.drain() {
                if let Some(line) = render::render_event(&event) {
                    println!("{line}");
                }
            }
            io::stdout().flush().context("writing to the terminal")?;
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        self.state = state;

        for effect in self.runner.enqueue(effects) {
            self.apply_view_effect(effect);
        }
        if was_dirty {
            self.sync_viewport();
            self.pending_render = true;
        }
    }

    /// Mounts, refreshes or unmounts the report viewport to match the state.
    fn sync_viewport(&mut self) {
        let view = self.state.view();
        match view.report {
            Some(report) => {
                let was_mounted = self.viewport.is_mounted();
                let same_report = self.viewport.report_id() == Some(report.id.as_str());
                if !self.viewport.load(&report.id, &report.markdown, &report.sections) {
                    return;
                }
                if !was_mounted {
                    self.send(TocMsg::Mounted);
                } else if same_report {
                    self.send(TocMsg::Resized);
                }
            }
            None if self.viewport.is_mounted() => {
                self.viewport.clear();
                self.send(TocMsg::Unmounted);
            }
            None => {}
        }
    }

    fn apply_view_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AttachScrollListener => self.viewport.set_listening(true),
            Effect::DetachScrollListener => self.viewport.set_listening(false),
            Effect::RequestAnimationFrame => {
                let tops = self.viewport.section_tops();
                self.send(TocMsg::AnimationFrame { tops });
            }
            Effect::SmoothScrollTo { section_id, top } => {
                sparlo_debug!("Scrolling to {} at {}", section_id, top);
                self.viewport.scroll_to(top);
                self.send(TocMsg::ScrollSettled);
            }
            Effect::ScrollMessagesToBottom => self.pending_render = true,
            other => sparlo_debug!("Ignoring effect {:?}", other),
        }
    }

    fn send(&self, msg: impl Into<Msg>) {
        let _ = self.msg_tx.send(msg.into());
    }

    /// Returns false when the user asked to quit.
    fn handle_line(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        let command = match commands::parse(line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                return true;
            }
        };

        let view = self.state.view();
        match command {
            Command::Reports => self.dispatch(DashboardMsg::Opened.into()),
            Command::Search(query) => self.dispatch(DashboardMsg::QueryChanged(query).into()),
            Command::Filter(status) => {
                self.dispatch(DashboardMsg::StatusFilterChanged(status).into())
            }
            Command::Open(arg) => self.dispatch(Msg::OpenReport {
                report_id: commands::resolve_report(&arg, &view),
            }),
            Command::Close => self.dispatch(Msg::CloseReport),
            Command::Archive(arg) => self.dispatch(
                DashboardMsg::ArchiveClicked {
                    report_id: commands::resolve_report(&arg, &view),
                }
                .into(),
            ),
            Command::Cancel(arg) => self.dispatch(
                DashboardMsg::CancelClicked {
                    report_id: commands::resolve_report(&arg, &view),
                }
                .into(),
            ),
            Command::New(design_challenge) => {
                self.dispatch(Msg::CreateReport { design_challenge })
            }
            Command::Export => self.dispatch(Msg::ExportRequested),
            Command::Read => {
                if self.viewport.is_mounted() {
                    println!("{}", self.viewport.visible_lines().join("\n"));
                } else {
                    println!("No report is open.");
                }
            }
            Command::Toc => match &view.report {
                Some(report) => print!(
                    "{}",
                    render::render_toc(&report.sections, report.active_section.as_deref())
                ),
                None => println!("No report is open."),
            },
            Command::Goto(section_id) => {
                let document_top = self.viewport.document_top(&section_id);
                self.dispatch(
                    TocMsg::NavClicked {
                        section_id,
                        document_top,
                    }
                    .into(),
                );
            }
            Command::Scroll(lines) => {
                self.viewport.scroll_by_lines(lines);
                if self.viewport.is_listening() {
                    self.dispatch(TocMsg::Scrolled.into());
                }
            }
            Command::ToggleChat => self.dispatch(ChatMsg::ToggleClicked.into()),
            Command::StopStream => self.dispatch(ChatMsg::CancelClicked.into()),
            Command::Escape => self.dispatch(ChatMsg::EscapePressed.into()),
            Command::ChatBack(lines) => self.dispatch(
                ChatMsg::Scrolled {
                    distance_from_bottom: f64::from(lines) * LINE_HEIGHT,
                }
                .into(),
            ),
            Command::Usage => {
                for effect in self.runner.enqueue(vec![Effect::CheckUsage]) {
                    self.apply_view_effect(effect);
                }
            }
            Command::Dismiss => self.dispatch(DashboardMsg::ErrorDismissed.into()),
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => return false,
            Command::Say(text) => {
                if !view.chat.open {
                    self.dispatch(ChatMsg::ToggleClicked.into());
                }
                self.dispatch(ChatMsg::InputChanged(text).into());
                self.dispatch(ChatMsg::Submitted.into());
            }
        }
        true
    }
}
