use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use obs_client::RemoteSession;
use serde_json::json;
use shared::{
    domain::{InputName, ScrollDirection, SceneName},
    error::ControlError,
};
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    audio::{MuteSwitch, VolumeFader},
    config::{PanelConfig, ReturnSpec},
    events::{ControlEvent, EventSink},
    indicator::IndicatorLamp,
    persistent::PersistentShared,
    pip::{PipSettings, PipTransform},
    playback::{CuePlayer, PlaybackTimer},
    presentation::Presentation,
    registry::EntityRegistry,
    scene::SceneSelector,
};

/// Fixed inputs, scenes and timings the break/return macros are built from.
#[derive(Debug, Clone)]
pub struct MacroLayout {
    pub instructor: InputName,
    pub broadcaster: InputName,
    pub break_scene: SceneName,
    pub return_cue: String,
    pub jingle_wait: Duration,
}

/// Top-level context: owns every control entity and hands them out by reference.
pub struct ControlSurface {
    session: Arc<dyn RemoteSession>,
    events: EventSink,
    persistent: Arc<PersistentShared>,
    scenes: Arc<SceneSelector>,
    mutes: BTreeMap<InputName, Arc<MuteSwitch>>,
    volume: Arc<VolumeFader>,
    pip: Arc<PipTransform>,
    lamps: Vec<Arc<IndicatorLamp>>,
    timer: Arc<PlaybackTimer>,
    cues: CuePlayer,
    registry: EntityRegistry,
    layout: MacroLayout,
    return_scenes: Vec<ReturnSpec>,
    jingle_enabled: AtomicBool,
}

impl ControlSurface {
    /// Builds the entities from a validated config. Nothing is read from the host until
    /// [`ControlSurface::seed`].
    pub fn new(session: Arc<dyn RemoteSession>, config: &PanelConfig) -> Self {
        let events = EventSink::new();
        let echo_grace = config.echo_grace();
        let persistent = Arc::new(PersistentShared::new(session.clone(), config.realm.clone()));

        let scenes = Arc::new(SceneSelector::new(
            session.clone(),
            events.clone(),
            config.scenes.clone(),
            config.safe_scenes.iter().cloned(),
            echo_grace,
        ));
        let mutes: BTreeMap<_, _> = config
            .mutes
            .iter()
            .map(|spec| {
                let mute = MuteSwitch::new(session.clone(), events.clone(), spec.clone(), echo_grace);
                (spec.input.clone(), Arc::new(mute))
            })
            .collect();
        let volume = Arc::new(VolumeFader::new(
            session.clone(),
            events.clone(),
            config.volume_input.clone(),
            echo_grace,
        ));
        let pip = Arc::new(PipTransform::new(
            session.clone(),
            events.clone(),
            persistent.clone(),
            PipSettings {
                source: config.pip_source.clone(),
                scenes: config.pip_scenes.clone(),
                poll_scene: config.pip_poll_scene.clone(),
                default_scale: config.pip_default_scale,
                echo_grace,
            },
        ));
        let lamps: Vec<_> = config
            .lamps
            .iter()
            .map(|spec| {
                Arc::new(IndicatorLamp::new(
                    persistent.clone(),
                    events.clone(),
                    spec.clone(),
                    echo_grace,
                ))
            })
            .collect();
        let timer = Arc::new(PlaybackTimer::new(
            session.clone(),
            events.clone(),
            config.playback_input.clone(),
            config.playback_poll(),
        ));
        let cues = CuePlayer::new(
            session.clone(),
            config.playback_input.clone(),
            config.cues.clone(),
        );

        let mut registry = EntityRegistry::default();
        registry.register(scenes.clone());
        for mute in mutes.values() {
            registry.register(mute.clone());
        }
        registry.register(volume.clone());
        registry.register(pip.clone());
        for lamp in &lamps {
            registry.register(lamp.clone());
        }
        registry.register(timer.clone());

        Self {
            session,
            events,
            persistent,
            scenes,
            mutes,
            volume,
            pip,
            lamps,
            timer,
            cues,
            registry,
            layout: MacroLayout {
                instructor: config.instructor_input.clone(),
                broadcaster: config.broadcaster_input.clone(),
                break_scene: config.break_scene.clone(),
                return_cue: config.return_cue.clone(),
                jingle_wait: config.jingle_wait(),
            },
            return_scenes: config.return_scenes.clone(),
            jingle_enabled: AtomicBool::new(config.jingle_enabled),
        }
    }

    /// Mandatory initial observation of every entity. The surface is not ready before this
    /// succeeds.
    pub async fn seed(&self) -> Result<(), ControlError> {
        self.scenes.seed().await?;
        for mute in self.mutes.values() {
            mute.seed().await?;
        }
        self.volume.seed().await?;
        self.pip.seed().await?;
        for lamp in &self.lamps {
            lamp.seed().await?;
        }
        self.timer.restart();
        info!(entities = self.registry.len(), "surface: seeded from host");
        Ok(())
    }

    pub fn session(&self) -> &Arc<dyn RemoteSession> {
        &self.session
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    pub fn persistent(&self) -> &Arc<PersistentShared> {
        &self.persistent
    }

    pub fn scenes(&self) -> &Arc<SceneSelector> {
        &self.scenes
    }

    pub fn mutes(&self) -> impl Iterator<Item = &Arc<MuteSwitch>> {
        self.mutes.values()
    }

    pub fn mute(&self, input: &InputName) -> Result<&Arc<MuteSwitch>, ControlError> {
        self.mutes
            .get(input)
            .ok_or_else(|| ControlError::unknown("input", input.as_str()))
    }

    pub fn volume(&self) -> &Arc<VolumeFader> {
        &self.volume
    }

    pub fn pip(&self) -> &Arc<PipTransform> {
        &self.pip
    }

    pub fn lamps(&self) -> &[Arc<IndicatorLamp>] {
        &self.lamps
    }

    /// Looks a lamp up by short name (`time`) or slot (`indicator-time`).
    pub fn lamp(&self, name: &str) -> Result<&Arc<IndicatorLamp>, ControlError> {
        self.lamps
            .iter()
            .find(|lamp| lamp.spec().name == name || lamp.slot() == name)
            .ok_or_else(|| ControlError::unknown("lamp", name))
    }

    pub fn timer(&self) -> &Arc<PlaybackTimer> {
        &self.timer
    }

    pub fn cues(&self) -> &CuePlayer {
        &self.cues
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn layout(&self) -> &MacroLayout {
        &self.layout
    }

    pub fn return_scenes(&self) -> &[ReturnSpec] {
        &self.return_scenes
    }

    pub fn jingle_enabled(&self) -> bool {
        self.jingle_enabled.load(Ordering::SeqCst)
    }

    pub fn set_jingle_enabled(&self, enabled: bool) {
        self.jingle_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "surface: jingle on return");
    }

    pub async fn presentations(&self) -> Vec<Presentation> {
        self.registry.presentations().await
    }

    /// Asks every controller's notes window to scroll. Handled by the OS bridge on the
    /// receiving side, including this one.
    pub async fn request_scroll(&self, direction: ScrollDirection) -> Result<(), ControlError> {
        self.persistent
            .broadcast(direction.event_field(), json!(true))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/surface_tests.rs"]
mod tests;
