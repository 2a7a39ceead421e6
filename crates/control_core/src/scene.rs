use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use obs_client::RemoteSession;
use shared::{
    domain::{EntityKey, Origin, SceneName},
    error::ControlError,
};
use tracing::{debug, info, warn};

use crate::{
    config::SceneSpec,
    entity::{Observation, SyncedValue},
    events::EventSink,
    presentation::{ColorClass, Presentable, Presentation, PresentedValue},
};

/// The program scene. Exactly one known scene is active once seeded.
pub struct SceneSelector {
    session: Arc<dyn RemoteSession>,
    events: EventSink,
    scenes: Vec<SceneSpec>,
    safe: HashSet<SceneName>,
    active: SyncedValue<Option<SceneName>>,
}

impl SceneSelector {
    pub fn new(
        session: Arc<dyn RemoteSession>,
        events: EventSink,
        scenes: Vec<SceneSpec>,
        safe: impl IntoIterator<Item = SceneName>,
        echo_grace: Duration,
    ) -> Self {
        Self {
            session,
            events,
            scenes,
            safe: safe.into_iter().collect(),
            active: SyncedValue::new(EntityKey::scene_selector(), None, echo_grace),
        }
    }

    pub fn scenes(&self) -> &[SceneSpec] {
        &self.scenes
    }

    pub fn is_known(&self, name: &SceneName) -> bool {
        self.scenes.iter().any(|spec| &spec.name == name)
    }

    pub fn is_safe(&self, name: &SceneName) -> bool {
        self.safe.contains(name)
    }

    pub async fn active(&self) -> Option<SceneName> {
        self.active.current().await
    }

    /// The single transition for scene state.
    ///
    /// Unknown names never change state: from the host they are logged and ignored, from the
    /// operator they are reported as `UnknownEntity` without sending anything.
    pub async fn switch(&self, name: &SceneName, origin: Origin) -> Result<(), ControlError> {
        if !self.is_known(name) {
            warn!(scene = %name, ?origin, "scene: ignoring unknown scene");
            return match origin {
                Origin::Remote => Ok(()),
                Origin::Local => Err(ControlError::unknown("scene", name.as_str())),
            };
        }

        match origin {
            Origin::Remote => {
                match self.active.observe(Some(name.clone())).await {
                    Observation::Echo => debug!(scene = %name, "scene: echo confirmed"),
                    Observation::Changed => info!(scene = %name, "scene: switched by host"),
                    Observation::Unchanged => debug!(scene = %name, "scene: unchanged"),
                }
                self.publish().await;
                Ok(())
            }
            Origin::Local => {
                let staged = self.active.stage_local(Some(name.clone())).await;
                self.publish().await;
                if let Err(err) = self.session.set_current_program_scene(name).await {
                    warn!(scene = %name, "scene: switch failed: {err}");
                    if self.active.revert_local(staged).await {
                        self.publish().await;
                    }
                    return Err(err.into());
                }
                info!(scene = %name, "scene: switched");
                Ok(())
            }
        }
    }

    pub async fn seed(&self) -> Result<(), ControlError> {
        let current = self.session.get_current_program_scene().await?;
        self.switch(&current, Origin::Remote).await
    }

    async fn publish(&self) {
        self.events.presentations(self.presentations().await);
    }
}

#[async_trait]
impl Presentable for SceneSelector {
    fn key(&self) -> &EntityKey {
        self.active.key()
    }

    async fn presentations(&self) -> Vec<Presentation> {
        let active = self.active.current().await;
        self.scenes
            .iter()
            .map(|spec| {
                let is_active = active.as_ref() == Some(&spec.name);
                let color = match (is_active, self.is_safe(&spec.name)) {
                    (false, _) => ColorClass::Neutral,
                    (true, true) => ColorClass::Safe,
                    (true, false) => ColorClass::Active,
                };
                Presentation {
                    key: EntityKey::scene(&spec.name),
                    value: PresentedValue::Flag(is_active),
                    text: spec.label.clone(),
                    color,
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/scene_tests.rs"]
mod tests;
