use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use shared::domain::{InputName, SceneName};
use thiserror::Error;
use tracing::{debug, warn};

pub const PROFILE_REALM: &str = "OBS_WEBSOCKET_DATA_REALM_PROFILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpec {
    pub name: SceneName,
    pub label: String,
    #[serde(default = "default_true")]
    pub selectable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSpec {
    pub scene: SceneName,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuteSpec {
    pub input: InputName,
    pub label: String,
    #[serde(default = "default_true")]
    pub operator_controllable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueSpec {
    pub label: String,
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LampColor {
    Red,
    Yellow,
    Cyan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LampSpec {
    pub name: String,
    pub label: String,
    pub color: LampColor,
}

impl LampSpec {
    /// Persistent slot and custom-event field shared by every controller.
    pub fn slot(&self) -> String {
        format!("indicator-{}", self.name)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub request_timeout_ms: u64,
    pub echo_grace_ms: u64,
    pub playback_poll_ms: u64,
    /// Fallback poll of the PIP scale; the host's transform notifications are unreliable.
    pub pip_poll_ms: Option<u64>,
    pub realm: String,
    pub scenes: Vec<SceneSpec>,
    pub safe_scenes: Vec<SceneName>,
    pub break_scene: SceneName,
    pub return_scenes: Vec<ReturnSpec>,
    pub pip_source: String,
    pub pip_scenes: Vec<SceneName>,
    pub pip_poll_scene: SceneName,
    pub pip_default_scale: f64,
    pub instructor_input: InputName,
    pub broadcaster_input: InputName,
    pub mutes: Vec<MuteSpec>,
    pub volume_input: InputName,
    pub playback_input: InputName,
    pub cues: Vec<CueSpec>,
    pub return_cue: String,
    pub jingle_wait_ms: u64,
    pub jingle_enabled: bool,
    pub lamps: Vec<LampSpec>,
}

fn scene(name: &str, label: &str, selectable: bool) -> SceneSpec {
    SceneSpec {
        name: SceneName::new(name),
        label: label.to_string(),
        selectable,
    }
}

fn lamp(name: &str, label: &str, color: LampColor) -> LampSpec {
    LampSpec {
        name: name.to_string(),
        label: label.to_string(),
        color,
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| SceneName::new(*s)).collect::<Vec<_>>();
        Self {
            host: "localhost".into(),
            port: 4455,
            password: None,
            request_timeout_ms: 3000,
            echo_grace_ms: 1000,
            playback_poll_ms: 500,
            pip_poll_ms: None,
            realm: PROFILE_REALM.into(),
            scenes: vec![
                scene("Title", "Title", true),
                scene("Gallery", "Gallery", true),
                scene("Screenshare", "Screen", true),
                scene("ScreenshareCrop", "ScrLSCrp", true),
                scene("ScreenshareLandscape", "ScreenLS", true),
                scene("Broadcaster-Screen", "BrdScr", false),
                scene("Notes", "Notes", true),
                scene("Empty", "Empty", true),
            ],
            safe_scenes: names(&["Title", "Notes", "Empty"]),
            break_scene: SceneName::new("Notes"),
            return_scenes: vec![
                ReturnSpec {
                    scene: SceneName::new("Screenshare"),
                    label: "BACK(ss)".into(),
                },
                ReturnSpec {
                    scene: SceneName::new("ScreenshareLandscape"),
                    label: "BACK(ss-ls)".into(),
                },
                ReturnSpec {
                    scene: SceneName::new("ScreenshareCrop"),
                    label: "BACK(ss-c)".into(),
                },
                ReturnSpec {
                    scene: SceneName::new("Notes"),
                    label: "BACK(n)".into(),
                },
            ],
            pip_source: "_GalleryCapture[hidden]".into(),
            pip_scenes: names(&[
                "Screenshare",
                "ScreenshareCrop",
                "ScreenshareLandscape",
                "Broadcaster-Screen",
                "Notes",
            ]),
            pip_poll_scene: SceneName::new("Notes"),
            pip_default_scale: 0.25,
            instructor_input: InputName::new("Instructors"),
            broadcaster_input: InputName::new("BroadcasterMic"),
            mutes: vec![
                MuteSpec {
                    input: InputName::new("BroadcasterMic"),
                    label: "Brcd".into(),
                    operator_controllable: false,
                },
                MuteSpec {
                    input: InputName::new("Instructors"),
                    label: "Instr".into(),
                    operator_controllable: true,
                },
            ],
            volume_input: InputName::new("Instructors"),
            playback_input: InputName::new("CRaudio"),
            cues: vec![
                CueSpec {
                    label: "long".into(),
                    file: "CR_LOGO_Jingle_long.mp3".into(),
                },
                CueSpec {
                    label: "short".into(),
                    file: "CR_LOGO_sound_short.mp3".into(),
                },
            ],
            return_cue: "short".into(),
            jingle_wait_ms: 3000,
            jingle_enabled: false,
            lamps: vec![
                lamp("masterwarning", "M Warning", LampColor::Red),
                lamp("mastercaution", "M Caution", LampColor::Yellow),
                lamp("time", "Time", LampColor::Yellow),
                lamp("notes", "Notes", LampColor::Cyan),
                lamp("question", "Question", LampColor::Cyan),
            ],
        }
    }
}

impl PanelConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Defaults, then the config file, then environment overrides.
    ///
    /// An explicit path must exist; the fallback path is only read when present.
    pub fn load(explicit: Option<&Path>, fallback: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, fallback, |key| std::env::var(key).ok())
    }

    /// [`PanelConfig::load`] with the environment supplied by `lookup`.
    pub fn load_with(
        explicit: Option<&Path>,
        fallback: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => fallback.filter(|path| path.is_file()),
        };

        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                debug!(path = %path.display(), "config: loaded panel file");
                Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse { path, source })?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("OBS_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("OBS_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!(value = %v, "config: ignoring invalid OBS_PORT"),
            }
        }
        if let Some(v) = lookup("OBS_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => warn!(value = %v, "config: ignoring invalid APP__REQUEST_TIMEOUT_MS"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let known: HashSet<&SceneName> = self.scenes.iter().map(|spec| &spec.name).collect();
        let referenced = self
            .safe_scenes
            .iter()
            .chain(&self.pip_scenes)
            .chain(std::iter::once(&self.break_scene))
            .chain(std::iter::once(&self.pip_poll_scene))
            .chain(self.return_scenes.iter().map(|spec| &spec.scene));
        for scene in referenced {
            if !known.contains(scene) {
                return Err(ConfigError::Invalid(format!(
                    "scene '{scene}' is referenced but not in the scene table"
                )));
            }
        }

        for input in [&self.instructor_input, &self.broadcaster_input] {
            if !self.mutes.iter().any(|spec| &spec.input == input) {
                return Err(ConfigError::Invalid(format!(
                    "input '{input}' used by macros has no mute entry"
                )));
            }
        }
        if !self.cues.iter().any(|cue| cue.label == self.return_cue) {
            return Err(ConfigError::Invalid(format!(
                "return cue '{}' is not a configured cue",
                self.return_cue
            )));
        }
        if !(0.0..=1.0).contains(&self.pip_default_scale) {
            return Err(ConfigError::Invalid(format!(
                "pip_default_scale {} outside 0..=1",
                self.pip_default_scale
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn echo_grace(&self) -> Duration {
        Duration::from_millis(self.echo_grace_ms)
    }

    pub fn playback_poll(&self) -> Duration {
        Duration::from_millis(self.playback_poll_ms.max(1))
    }

    pub fn pip_poll(&self) -> Option<Duration> {
        self.pip_poll_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn jingle_wait(&self) -> Duration {
        Duration::from_millis(self.jingle_wait_ms)
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
