use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use obs_client::RemoteSession;
use serde_json::{json, Value};
use shared::{
    domain::{EntityKey, Origin, SceneName},
    error::{ControlError, RemoteError, SceneFailure},
    protocol::SceneItemTransform,
};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    crop::{inset_for, AudienceBand},
    entity::{Observation, SyncedValue},
    events::EventSink,
    persistent::PersistentShared,
    presentation::{ColorClass, Presentable, Presentation, PresentedValue},
};

/// Slot and custom-event field holding the pre-break PIP scale.
pub const SNAPSHOT_SLOT: &str = "pip_last_state";

type TransformEdit = dyn Fn(&mut SceneItemTransform) + Send + Sync;

pub struct PipSettings {
    pub source: String,
    pub scenes: Vec<SceneName>,
    pub poll_scene: SceneName,
    pub default_scale: f64,
    pub echo_grace: Duration,
}

/// Scale of the picture-in-picture element, kept identical across every hosting scene.
pub struct PipTransform {
    session: Arc<dyn RemoteSession>,
    events: EventSink,
    persistent: Arc<PersistentShared>,
    source: String,
    scenes: Vec<SceneName>,
    poll_scene: SceneName,
    poll_item: Mutex<Option<i64>>,
    scale: SyncedValue<f64>,
    last_saved: RwLock<f64>,
}

fn check_scale(key: &EntityKey, scale: f64) -> Result<(), ControlError> {
    if scale.is_finite() && (0.0..=1.0).contains(&scale) {
        Ok(())
    } else {
        Err(ControlError::ValueOutOfRange {
            key: key.clone(),
            value: scale,
            min: 0.0,
            max: 1.0,
        })
    }
}

impl PipTransform {
    pub fn new(
        session: Arc<dyn RemoteSession>,
        events: EventSink,
        persistent: Arc<PersistentShared>,
        settings: PipSettings,
    ) -> Self {
        Self {
            session,
            events,
            persistent,
            source: settings.source,
            scenes: settings.scenes,
            poll_scene: settings.poll_scene,
            poll_item: Mutex::new(None),
            scale: SyncedValue::new(EntityKey::pip(), 0.0, settings.echo_grace),
            last_saved: RwLock::new(settings.default_scale),
        }
    }

    pub fn scenes(&self) -> &[SceneName] {
        &self.scenes
    }

    pub async fn scale(&self) -> f64 {
        self.scale.current().await
    }

    pub async fn last_saved_scale(&self) -> f64 {
        *self.last_saved.read().await
    }

    /// Remote origin only refreshes the cache and takes the host's value as reported, even
    /// outside the slider's range. Local origin rewrites the scale of every hosting scene,
    /// one read-modify-write at a time; see [`PipTransform::edit_all`].
    pub async fn update(&self, scale: f64, origin: Origin) -> Result<(), ControlError> {
        match origin {
            Origin::Remote => {
                if self.scale.observe(scale).await == Observation::Changed {
                    info!(scale, "pip: scale changed by host");
                }
                self.publish().await;
                Ok(())
            }
            Origin::Local => {
                check_scale(self.key(), scale)?;
                let staged = self.scale.stage_local(scale).await;
                self.publish().await;
                let edit = move |transform: &mut SceneItemTransform| {
                    transform.scale_x = scale;
                    transform.scale_y = scale;
                };
                match self.edit_all(&edit).await {
                    Ok(()) => {
                        info!(scale, "pip: scale set");
                        Ok(())
                    }
                    Err(err) => {
                        if !matches!(err, ControlError::PartialTransformFailure { .. })
                            && self.scale.revert_local(staged).await
                        {
                            self.publish().await;
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    pub async fn apply_crop(&self, band: AudienceBand) -> Result<(), ControlError> {
        let inset = inset_for(band);
        let edit = move |transform: &mut SceneItemTransform| inset.apply_to(transform);
        self.edit_all(&edit).await?;
        info!(band = band.label(), "pip: crop set");
        Ok(())
    }

    /// Remembers the current scale as the pre-break value, for this controller and, through
    /// the persistent store and a broadcast, for every other one.
    pub async fn save_snapshot(&self) -> Result<(), ControlError> {
        // The host may carry a scale above 1; the snapshot must stay restorable.
        let scale = self.scale().await.clamp(0.0, 1.0);
        *self.last_saved.write().await = scale;
        self.persistent.publish(SNAPSHOT_SLOT, json!(scale)).await?;
        info!(scale, "pip: snapshot saved");
        Ok(())
    }

    pub async fn restore_snapshot(&self) -> Result<(), ControlError> {
        let scale = self.last_saved_scale().await;
        self.update(scale, Origin::Local).await
    }

    /// Another controller (or our own broadcast) announced a snapshot.
    pub async fn observe_snapshot(&self, value: &Value) -> Result<(), ControlError> {
        let scale = value
            .as_f64()
            .ok_or_else(|| ControlError::invalid_payload(SNAPSHOT_SLOT, "expected a number"))?;
        check_scale(self.key(), scale)?;
        *self.last_saved.write().await = scale;
        debug!(scale, "pip: snapshot observed");
        Ok(())
    }

    /// Reads the scale of the poll scene and feeds it through the remote path.
    pub async fn poll_once(&self) -> Result<f64, ControlError> {
        let item_id = self.poll_item_id().await?;
        let transform = match self
            .session
            .get_scene_item_transform(&self.poll_scene, item_id)
            .await
        {
            Ok(transform) => transform,
            Err(err) => {
                // The item may have been re-added under a new id.
                *self.poll_item.lock().await = None;
                return Err(err.into());
            }
        };
        self.update(transform.scale_x, Origin::Remote).await?;
        Ok(transform.scale_x)
    }

    async fn poll_item_id(&self) -> Result<i64, RemoteError> {
        let mut cached = self.poll_item.lock().await;
        if let Some(item_id) = *cached {
            return Ok(item_id);
        }
        let item_id = self
            .session
            .get_scene_item_id(&self.poll_scene, &self.source)
            .await?;
        *cached = Some(item_id);
        Ok(item_id)
    }

    /// Transform notifications do not arrive reliably for this item, so the scale is polled.
    pub fn spawn_poll(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let pip = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = pip.poll_once().await {
                    warn!("pip: poll failed: {err}");
                }
            }
        })
    }

    pub async fn seed(&self) -> Result<(), ControlError> {
        match self.persistent.load(SNAPSHOT_SLOT).await? {
            Some(value) => {
                if let Err(err) = self.observe_snapshot(&value).await {
                    warn!("pip: ignoring stored snapshot: {err}");
                }
            }
            None => debug!("pip: no stored snapshot, keeping default"),
        }
        self.poll_once().await.map(drop)
    }

    /// Read-modify-write of the PIP item in every hosting scene.
    ///
    /// Not atomic across scenes and never rolled back. Every scene is attempted; when some
    /// succeed the failures come back as `PartialTransformFailure`, when all fail the first
    /// host error is returned as is.
    pub async fn edit_all(&self, edit: &TransformEdit) -> Result<(), ControlError> {
        let mut failures = Vec::new();
        let mut first_error = None;
        for scene in &self.scenes {
            if let Err(err) = self.edit_scene(scene, edit).await {
                warn!(scene = %scene, "pip: transform update failed: {err}");
                failures.push(SceneFailure {
                    scene: scene.clone(),
                    reason: err.to_string(),
                });
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(err) if failures.len() == self.scenes.len() => Err(err.into()),
            Some(_) => Err(ControlError::PartialTransformFailure {
                attempted: self.scenes.len(),
                failures,
            }),
        }
    }

    async fn edit_scene(&self, scene: &SceneName, edit: &TransformEdit) -> Result<(), RemoteError> {
        let item_id = self.session.get_scene_item_id(scene, &self.source).await?;
        let mut transform = self.session.get_scene_item_transform(scene, item_id).await?;
        edit(&mut transform);
        self.session
            .set_scene_item_transform(scene, item_id, transform)
            .await
    }

    async fn publish(&self) {
        self.events.presentations(self.presentations().await);
    }
}

#[async_trait]
impl Presentable for PipTransform {
    fn key(&self) -> &EntityKey {
        self.scale.key()
    }

    async fn presentations(&self) -> Vec<Presentation> {
        let scale = self.scale().await;
        vec![Presentation {
            key: self.key().clone(),
            value: PresentedValue::Level(scale),
            text: format!("{scale:.2}"),
            color: if scale == 0.0 {
                ColorClass::Neutral
            } else {
                ColorClass::Active
            },
        }]
    }
}

#[cfg(test)]
#[path = "tests/pip_tests.rs"]
mod tests;
