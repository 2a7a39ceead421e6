use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use obs_client::RemoteSession;
use shared::{
    domain::{EntityKey, InputName},
    error::ControlError,
};
use tracing::{debug, info, warn};

use crate::{
    config::MuteSpec,
    entity::{Observation, SyncedValue},
    events::EventSink,
    presentation::{ColorClass, Presentable, Presentation, PresentedValue},
};

pub const GAIN_STATE_MIN: f64 = -2.0;
pub const GAIN_STATE_MAX: f64 = 0.0;

/// Slider position to host gain: `1 - 10^(-state)`.
pub fn gain_state_to_db(state: f64) -> f64 {
    1.0 - 10f64.powf(-state)
}

/// Host gain to slider position: `-log10(1 - dB)`, clamped into the slider range.
pub fn db_to_gain_state(db: f64) -> f64 {
    if db.is_nan() || db == f64::NEG_INFINITY {
        return GAIN_STATE_MIN;
    }
    let headroom = 1.0 - db;
    if headroom <= 0.0 {
        return GAIN_STATE_MAX;
    }
    (-headroom.log10()).clamp(GAIN_STATE_MIN, GAIN_STATE_MAX)
}

pub struct MuteSwitch {
    session: Arc<dyn RemoteSession>,
    events: EventSink,
    spec: MuteSpec,
    muted: SyncedValue<bool>,
}

impl MuteSwitch {
    pub fn new(
        session: Arc<dyn RemoteSession>,
        events: EventSink,
        spec: MuteSpec,
        echo_grace: Duration,
    ) -> Self {
        let key = EntityKey::mute(&spec.input);
        Self {
            session,
            events,
            spec,
            muted: SyncedValue::new(key, false, echo_grace),
        }
    }

    pub fn input(&self) -> &InputName {
        &self.spec.input
    }

    pub fn spec(&self) -> &MuteSpec {
        &self.spec
    }

    pub async fn muted(&self) -> bool {
        self.muted.current().await
    }

    pub async fn apply(&self, muted: bool) -> Result<(), ControlError> {
        let staged = self.muted.stage_local(muted).await;
        self.publish().await;
        if let Err(err) = self.session.set_input_mute(&self.spec.input, muted).await {
            warn!(input = %self.spec.input, muted, "audio: mute failed: {err}");
            if self.muted.revert_local(staged).await {
                self.publish().await;
            }
            return Err(err.into());
        }
        info!(input = %self.spec.input, muted, "audio: mute set");
        Ok(())
    }

    pub async fn toggle(&self) -> Result<(), ControlError> {
        let muted = self.muted().await;
        self.apply(!muted).await
    }

    pub async fn observe(&self, muted: bool) {
        match self.muted.observe(muted).await {
            Observation::Echo => debug!(input = %self.spec.input, muted, "audio: mute echo"),
            Observation::Changed => info!(input = %self.spec.input, muted, "audio: mute changed by host"),
            Observation::Unchanged => debug!(input = %self.spec.input, muted, "audio: mute unchanged"),
        }
        self.publish().await;
    }

    pub async fn seed(&self) -> Result<(), ControlError> {
        let muted = self.session.get_input_mute(&self.spec.input).await?;
        self.observe(muted).await;
        Ok(())
    }

    async fn publish(&self) {
        self.events.presentations(self.presentations().await);
    }
}

#[async_trait]
impl Presentable for MuteSwitch {
    fn key(&self) -> &EntityKey {
        self.muted.key()
    }

    async fn presentations(&self) -> Vec<Presentation> {
        let muted = self.muted().await;
        vec![Presentation {
            key: self.key().clone(),
            value: PresentedValue::Flag(muted),
            text: self.spec.label.clone(),
            color: if muted {
                ColorClass::Neutral
            } else {
                ColorClass::Active
            },
        }]
    }
}

/// Input gain. Held in the host's dB domain; the slider domain is derived.
pub struct VolumeFader {
    session: Arc<dyn RemoteSession>,
    events: EventSink,
    input: InputName,
    db: SyncedValue<f64>,
}

impl VolumeFader {
    pub fn new(
        session: Arc<dyn RemoteSession>,
        events: EventSink,
        input: InputName,
        echo_grace: Duration,
    ) -> Self {
        let key = EntityKey::volume(&input);
        Self {
            session,
            events,
            input,
            db: SyncedValue::new(key, 0.0, echo_grace),
        }
    }

    pub fn input(&self) -> &InputName {
        &self.input
    }

    pub async fn db(&self) -> f64 {
        self.db.current().await
    }

    pub async fn gain_state(&self) -> f64 {
        db_to_gain_state(self.db().await)
    }

    /// Sets the slider position; values outside `[-2, 0]` are refused before anything is sent.
    pub async fn apply(&self, gain_state: f64) -> Result<(), ControlError> {
        if !gain_state.is_finite() || !(GAIN_STATE_MIN..=GAIN_STATE_MAX).contains(&gain_state) {
            return Err(ControlError::ValueOutOfRange {
                key: self.key().clone(),
                value: gain_state,
                min: GAIN_STATE_MIN,
                max: GAIN_STATE_MAX,
            });
        }
        let db = gain_state_to_db(gain_state);
        let staged = self.db.stage_local(db).await;
        self.publish().await;
        if let Err(err) = self.session.set_input_volume(&self.input, db).await {
            warn!(input = %self.input, db, "audio: volume failed: {err}");
            if self.db.revert_local(staged).await {
                self.publish().await;
            }
            return Err(err.into());
        }
        debug!(input = %self.input, gain_state, db, "audio: volume set");
        Ok(())
    }

    pub async fn observe(&self, db: f64) {
        match self.db.observe(db).await {
            Observation::Changed => info!(input = %self.input, db, "audio: volume changed by host"),
            _ => debug!(input = %self.input, db, "audio: volume confirmed"),
        }
        self.publish().await;
    }

    pub async fn seed(&self) -> Result<(), ControlError> {
        let db = self.session.get_input_volume(&self.input).await?;
        self.observe(db).await;
        Ok(())
    }

    async fn publish(&self) {
        self.events.presentations(self.presentations().await);
    }
}

#[async_trait]
impl Presentable for VolumeFader {
    fn key(&self) -> &EntityKey {
        self.db.key()
    }

    async fn presentations(&self) -> Vec<Presentation> {
        let db = self.db().await;
        vec![Presentation {
            key: self.key().clone(),
            value: PresentedValue::Level(db_to_gain_state(db)),
            text: format!("{db:.1} dB"),
            color: ColorClass::Neutral,
        }]
    }
}

#[cfg(test)]
#[path = "tests/audio_tests.rs"]
mod tests;
