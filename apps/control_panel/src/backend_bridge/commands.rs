//! Operator commands queued from the UI to the backend worker.

use control_core::crop::AudienceBand;
use shared::domain::{InputName, SceneName, ScrollDirection};

#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    SwitchScene(SceneName),
    ToggleMute(InputName),
    /// Slider position in gain-state units.
    SetVolume(f64),
    SetPipScale(f64),
    SetCrop(AudienceBand),
    Break,
    ReturnTo(SceneName),
    SetJingle(bool),
    PlayCue(String),
    StopPlayback,
    ToggleLamp(String),
    ScrollNotes(ScrollDirection),
}

impl PanelCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PanelCommand::SwitchScene(_) => "switch_scene",
            PanelCommand::ToggleMute(_) => "toggle_mute",
            PanelCommand::SetVolume(_) => "set_volume",
            PanelCommand::SetPipScale(_) => "set_pip_scale",
            PanelCommand::SetCrop(_) => "set_crop",
            PanelCommand::Break => "break",
            PanelCommand::ReturnTo(_) => "return",
            PanelCommand::SetJingle(_) => "set_jingle",
            PanelCommand::PlayCue(_) => "play_cue",
            PanelCommand::StopPlayback => "stop_playback",
            PanelCommand::ToggleLamp(_) => "toggle_lamp",
            PanelCommand::ScrollNotes(_) => "scroll_notes",
        }
    }
}
