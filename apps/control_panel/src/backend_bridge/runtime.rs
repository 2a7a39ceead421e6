//! Backend worker: owns the tokio runtime, the host session and the control surface, and
//! bridges them to the UI's crossbeam queues.

use std::{sync::Arc, thread};

use control_core::{
    ControlEvent, ControlSurface, MacroSequencer, PanelConfig, ReconciliationRouter,
};
use crossbeam_channel::{Receiver, Sender};
use obs_client::{ConnectOptions, ObsWebSocketSession, RemoteSession};
use shared::{domain::Origin, error::ControlError};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};

use crate::{
    backend_bridge::commands::PanelCommand,
    controller::events::{PanelError, PanelErrorContext, PanelEvent},
    os_bridge::NotesScroller,
};

pub struct BackendSettings {
    pub config: PanelConfig,
    /// Title regex of the notes window; scroll requests are ignored without it.
    pub notes_window: Option<String>,
}

pub fn launch(settings: BackendSettings, cmd_rx: Receiver<PanelCommand>, ui_tx: Sender<PanelEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!("failed to build backend runtime: {err}");
                send_error(
                    &ui_tx,
                    PanelErrorContext::BackendStartup,
                    format!("backend worker startup failure: {err}"),
                );
                return;
            }
        };
        runtime.block_on(run(settings, cmd_rx, ui_tx));
    });
}

fn send_error(ui_tx: &Sender<PanelEvent>, context: PanelErrorContext, message: impl Into<String>) {
    let _ = ui_tx.try_send(PanelEvent::Error(PanelError::from_message(context, message)));
}

async fn run(settings: BackendSettings, cmd_rx: Receiver<PanelCommand>, ui_tx: Sender<PanelEvent>) {
    let BackendSettings {
        config,
        notes_window,
    } = settings;

    let options = ConnectOptions::new(config.host.clone(), config.port)
        .with_password(config.password.clone())
        .with_request_timeout(config.request_timeout());
    let _ = ui_tx.try_send(PanelEvent::Info(format!("Connecting to {}", options.url())));
    let session = match ObsWebSocketSession::connect(options).await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!("host connection failed: {err}");
            send_error(&ui_tx, PanelErrorContext::BackendStartup, err.to_string());
            return;
        }
    };
    let session: Arc<dyn RemoteSession> = session;

    // Subscribe before seeding so nothing the host says in between is lost.
    let notifications = session.subscribe();
    let surface = Arc::new(ControlSurface::new(session, &config));
    let control_events = surface.subscribe();
    if let Err(err) = surface.seed().await {
        tracing::error!("initial observation failed: {err}");
        send_error(
            &ui_tx,
            PanelErrorContext::BackendStartup,
            format!("could not read the host's state: {err}"),
        );
        return;
    }

    let _router = ReconciliationRouter::new(&surface).spawn(notifications);
    let pip_poll = config
        .pip_poll()
        .map(|interval| surface.pip().spawn_poll(interval));
    let scroller = notes_window.map(NotesScroller::new);
    let _forwarder = tokio::spawn(forward_events(control_events, ui_tx.clone(), scroller, pip_poll));

    let _ = ui_tx.try_send(PanelEvent::Ready(surface.presentations().await));
    tracing::info!(host = %config.host, port = config.port, "control panel ready");

    let sequencer = MacroSequencer::new(Arc::clone(&surface));
    while let Ok(cmd) = cmd_rx.recv() {
        let surface = Arc::clone(&surface);
        let sequencer = sequencer.clone();
        let ui_tx = ui_tx.clone();
        tokio::spawn(async move {
            let name = cmd.name();
            if let Err(err) = execute(&surface, &sequencer, cmd).await {
                tracing::warn!(command = name, "command failed: {err}");
                let context = match name {
                    "break" | "return" => PanelErrorContext::Macro,
                    _ => PanelErrorContext::Command,
                };
                send_error(&ui_tx, context, err.to_string());
            }
        });
    }
    tracing::info!("ui closed the command queue; backend stopping");
}

async fn execute(
    surface: &ControlSurface,
    sequencer: &MacroSequencer,
    cmd: PanelCommand,
) -> Result<(), ControlError> {
    match cmd {
        PanelCommand::SwitchScene(scene) => surface.scenes().switch(&scene, Origin::Local).await,
        PanelCommand::ToggleMute(input) => surface.mute(&input)?.toggle().await,
        PanelCommand::SetVolume(gain_state) => surface.volume().apply(gain_state).await,
        PanelCommand::SetPipScale(scale) => surface.pip().update(scale, Origin::Local).await,
        PanelCommand::SetCrop(band) => surface.pip().apply_crop(band).await,
        // Reports arrive as `ControlEvent::MacroFinished`.
        PanelCommand::Break => sequencer.run_break().await.map(drop),
        PanelCommand::ReturnTo(scene) => sequencer.run_return(&scene).await.map(drop),
        PanelCommand::SetJingle(enabled) => {
            surface.set_jingle_enabled(enabled);
            Ok(())
        }
        PanelCommand::PlayCue(label) => surface.cues().play(&label).await,
        PanelCommand::StopPlayback => surface.cues().stop().await,
        PanelCommand::ToggleLamp(name) => surface.lamp(&name)?.toggle().await,
        PanelCommand::ScrollNotes(direction) => surface.request_scroll(direction).await,
    }
}

async fn forward_events(
    mut events: broadcast::Receiver<ControlEvent>,
    ui_tx: Sender<PanelEvent>,
    scroller: Option<NotesScroller>,
    pip_poll: Option<JoinHandle<()>>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "ui forwarder fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let forwarded = match event {
            ControlEvent::PresentationChanged(presentation) => PanelEvent::Presentation(presentation),
            ControlEvent::ScrollRequested(direction) => {
                if let Some(scroller) = &scroller {
                    if let Err(err) = scroller.scroll(direction).await {
                        tracing::warn!("notes scroll failed: {err:#}");
                        send_error(&ui_tx, PanelErrorContext::Notes, format!("{err:#}"));
                    }
                }
                continue;
            }
            ControlEvent::MacroFinished(report) => PanelEvent::MacroFinished(report),
            ControlEvent::ConnectionLost(reason) => {
                if let Some(poll) = &pip_poll {
                    poll.abort();
                }
                PanelEvent::ConnectionLost(reason)
            }
            ControlEvent::Error(message) => {
                PanelEvent::Error(PanelError::from_message(PanelErrorContext::Macro, message))
            }
        };
        if ui_tx.try_send(forwarded).is_err() {
            tracing::debug!("ui event queue unavailable; event dropped");
        }
    }
}
