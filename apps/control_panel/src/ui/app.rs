use std::{collections::HashMap, time::Duration};

use control_core::{
    audio::{GAIN_STATE_MAX, GAIN_STATE_MIN},
    config::{LampSpec, MuteSpec},
    crop::AudienceBand,
    presentation::{Presentation, PresentedValue},
    PanelConfig,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui::{self, RichText};
use shared::domain::{EntityKey, ScrollDirection};

use crate::{
    backend_bridge::commands::PanelCommand,
    controller::{events::PanelEvent, orchestration::dispatch_panel_command},
    ui::theme,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Connecting,
    Ready,
    Lost,
}

/// A slider whose position follows the host unless the operator is holding it.
#[derive(Debug, Clone, Copy)]
struct SliderDraft {
    value: f64,
    held: bool,
}

impl SliderDraft {
    fn new(value: f64) -> Self {
        Self { value, held: false }
    }

    fn follow(&mut self, value: f64) {
        if !self.held {
            self.value = value;
        }
    }
}

pub struct ControlPanelApp {
    cmd_tx: Sender<PanelCommand>,
    ui_rx: Receiver<PanelEvent>,
    config: PanelConfig,
    presentations: HashMap<EntityKey, Presentation>,
    volume: SliderDraft,
    pip: SliderDraft,
    jingle_enabled: bool,
    connection: ConnectionState,
    status: String,
}

impl ControlPanelApp {
    pub fn new(cmd_tx: Sender<PanelCommand>, ui_rx: Receiver<PanelEvent>, config: PanelConfig) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            jingle_enabled: config.jingle_enabled,
            pip: SliderDraft::new(config.pip_default_scale),
            config,
            presentations: HashMap::new(),
            volume: SliderDraft::new(GAIN_STATE_MAX),
            connection: ConnectionState::Connecting,
            status: "Connecting...".to_string(),
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                PanelEvent::Info(message) => self.status = message,
                PanelEvent::Ready(presentations) => {
                    for presentation in presentations {
                        self.absorb(presentation);
                    }
                    self.connection = ConnectionState::Ready;
                    self.status = format!("Connected to {}:{}", self.config.host, self.config.port);
                }
                PanelEvent::Presentation(presentation) => self.absorb(presentation),
                PanelEvent::MacroFinished(report) => {
                    self.status = match (&report.error, report.warnings.len()) {
                        (Some(error), _) => format!("{} failed: {error}", report.name),
                        (None, 0) => format!("{} done", report.name),
                        (None, warnings) => format!("{} done with {warnings} warning(s)", report.name),
                    };
                }
                PanelEvent::ConnectionLost(reason) => {
                    self.connection = ConnectionState::Lost;
                    self.status = format!("Connection to host lost: {reason}");
                }
                PanelEvent::Error(err) => {
                    tracing::debug!(context = ?err.context(), "backend error shown");
                    self.status = format!("{}: {}", err.label(), err.message());
                }
            }
        }
    }

    fn absorb(&mut self, presentation: Presentation) {
        if let PresentedValue::Level(level) = presentation.value {
            if presentation.key == EntityKey::volume(&self.config.volume_input) {
                self.volume.follow(level);
            } else if presentation.key == EntityKey::pip() {
                self.pip.follow(level);
            }
        }
        self.presentations.insert(presentation.key.clone(), presentation);
    }

    fn send(&mut self, cmd: PanelCommand) {
        dispatch_panel_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn presented(&self, key: &EntityKey) -> Option<&Presentation> {
        self.presentations.get(key)
    }

    fn colored_button(text: &str, color: Option<egui::Color32>) -> egui::Button<'static> {
        match color {
            Some(fill) => egui::Button::new(RichText::new(text).color(theme::text_on(fill))).fill(fill),
            None => egui::Button::new(text.to_string()),
        }
    }

    fn show_quick_actions(&mut self, ui: &mut egui::Ui, live: bool) {
        ui.label("Quick actions:");
        ui.horizontal(|ui| {
            if ui
                .add_enabled(live, egui::Button::new("BREAK"))
                .on_hover_text("Go to break: mute audio, hide PIP and switch to the break scene")
                .clicked()
            {
                self.send(PanelCommand::Break);
            }
            let returns = self.config.return_scenes.clone();
            for target in returns {
                if ui
                    .add_enabled(live, egui::Button::new(target.label.as_str()))
                    .on_hover_text(format!("Back from break to {}, restoring the PIP", target.scene))
                    .clicked()
                {
                    self.send(PanelCommand::ReturnTo(target.scene));
                }
            }
            if ui
                .checkbox(&mut self.jingle_enabled, "Jingle")
                .on_hover_text("Play the short jingle when coming back from break")
                .changed()
            {
                self.send(PanelCommand::SetJingle(self.jingle_enabled));
            }
        });
        ui.end_row();
    }

    fn show_scenes(&mut self, ui: &mut egui::Ui, live: bool) {
        ui.label("Scene:");
        ui.horizontal_wrapped(|ui| {
            let scenes = self.config.scenes.clone();
            for scene in scenes {
                let color = self
                    .presented(&EntityKey::scene(&scene.name))
                    .map(|p| p.color)
                    .and_then(theme::fill_for);
                let button = Self::colored_button(&scene.label, color);
                if ui
                    .add_enabled(live && scene.selectable, button)
                    .on_hover_text(scene.name.as_str())
                    .clicked()
                {
                    self.send(PanelCommand::SwitchScene(scene.name));
                }
            }
        });
        ui.end_row();
    }

    fn show_audio(&mut self, ui: &mut egui::Ui, live: bool) {
        ui.label("Audio:");
        ui.horizontal(|ui| {
            let mutes: Vec<MuteSpec> = self.config.mutes.clone();
            for spec in mutes {
                let color = self
                    .presented(&EntityKey::mute(&spec.input))
                    .map(|p| p.color)
                    .and_then(theme::fill_for);
                let hint = if spec.operator_controllable {
                    format!("Mute/unmute {}, red = live", spec.input)
                } else {
                    format!("{}, red = live. Only the broadcaster controls it", spec.input)
                };
                if ui
                    .add_enabled(live && spec.operator_controllable, Self::colored_button(&spec.label, color))
                    .on_hover_text(hint)
                    .clicked()
                {
                    self.send(PanelCommand::ToggleMute(spec.input));
                }
            }

            let response = ui.add_enabled(
                live,
                egui::Slider::new(&mut self.volume.value, GAIN_STATE_MIN..=GAIN_STATE_MAX)
                    .show_value(false),
            );
            self.volume.held = response.dragged();
            if response.drag_stopped() || (response.changed() && !response.dragged()) {
                self.send(PanelCommand::SetVolume(self.volume.value));
            }
            let volume_text = self
                .presented(&EntityKey::volume(&self.config.volume_input))
                .map_or_else(|| "?".to_string(), |p| p.text.clone());
            ui.label(volume_text);
        });
        ui.end_row();
    }

    fn show_pip(&mut self, ui: &mut egui::Ui, live: bool) {
        ui.label("PIP size:");
        ui.horizontal(|ui| {
            let response = ui.add_enabled(
                live,
                egui::Slider::new(&mut self.pip.value, 0.0..=1.0).show_value(false),
            );
            self.pip.held = response.dragged();
            if response.drag_stopped() || (response.changed() && !response.dragged()) {
                self.send(PanelCommand::SetPipScale(self.pip.value));
            }
            let pip_text = self
                .presented(&EntityKey::pip())
                .map_or_else(|| "?".to_string(), |p| p.text.clone());
            ui.label(pip_text);
        });
        ui.end_row();

        ui.label("PIP crop:");
        ui.horizontal(|ui| {
            for band in AudienceBand::ALL {
                if ui
                    .add_enabled(live, egui::Button::new(band.label()))
                    .on_hover_text("Crop the gallery capture for this many people")
                    .clicked()
                {
                    self.send(PanelCommand::SetCrop(band));
                }
            }
        });
        ui.end_row();
    }

    fn show_playback(&mut self, ui: &mut egui::Ui, live: bool) {
        ui.label("Jingle:");
        ui.horizontal(|ui| {
            let countdown = self
                .presented(&EntityKey::playback(&self.config.playback_input))
                .map_or_else(|| "-".to_string(), |p| p.text.clone());
            ui.monospace(countdown);
            let cues = self.config.cues.clone();
            for cue in cues {
                if ui
                    .add_enabled(live, egui::Button::new(cue.label.as_str()))
                    .on_hover_text(format!("Play {}", cue.file))
                    .clicked()
                {
                    self.send(PanelCommand::PlayCue(cue.label));
                }
            }
            if ui.add_enabled(live, egui::Button::new("Stop")).clicked() {
                self.send(PanelCommand::StopPlayback);
            }
        });
        ui.end_row();
    }

    fn show_lamps(&mut self, ui: &mut egui::Ui, live: bool) {
        ui.label("Indicator:");
        ui.horizontal(|ui| {
            let lamps: Vec<LampSpec> = self.config.lamps.clone();
            for lamp in lamps {
                let on = self
                    .presented(&EntityKey::lamp(&lamp.slot()))
                    .is_some_and(|p| p.value == PresentedValue::Flag(true));
                let button = Self::colored_button(&lamp.label, theme::lamp_fill(lamp.color, on));
                if ui
                    .add_enabled(live, button)
                    .on_hover_text("Shown to every controller; click to toggle")
                    .clicked()
                {
                    self.send(PanelCommand::ToggleLamp(lamp.name));
                }
            }
        });
        ui.end_row();
    }

    fn show_notes_scroll(&mut self, ui: &mut egui::Ui, live: bool) {
        ui.label("Notes scroll:");
        ui.horizontal(|ui| {
            for (label, direction) in [("Up", ScrollDirection::Up), ("Down", ScrollDirection::Down)] {
                if ui
                    .add_enabled(live, egui::Button::new(label))
                    .on_hover_text(format!("Scroll notes {}", label.to_ascii_lowercase()))
                    .clicked()
                {
                    self.send(PanelCommand::ScrollNotes(direction));
                }
            }
        });
        ui.end_row();
    }
}

impl eframe::App for ControlPanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        let live = self.connection == ConnectionState::Ready;

        egui::TopBottomPanel::bottom("status_line").show(ctx, |ui| {
            let text = RichText::new(&self.status);
            ui.label(match self.connection {
                ConnectionState::Lost => text.color(theme::LIVE_RED),
                _ => text.color(theme::DIM_TEXT),
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.monospace(chrono::Local::now().format("%H:%M:%S").to_string());
                if ui
                    .button("Quit control panel")
                    .on_hover_text("Quit the control panel (does not affect the stream)")
                    .clicked()
                {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
            ui.separator();

            egui::Grid::new("controls")
                .num_columns(2)
                .spacing([8.0, 6.0])
                .show(ui, |ui| {
                    self.show_quick_actions(ui, live);
                    self.show_scenes(ui, live);
                    self.show_audio(ui, live);
                    self.show_pip(ui, live);
                    self.show_playback(ui, live);
                    self.show_lamps(ui, live);
                    self.show_notes_scroll(ui, live);
                });
        });

        // The clock and countdown need a steady tick even without input.
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}
