use std::{collections::HashMap, sync::Arc};

use serde_json::{Map, Value};
use shared::{
    domain::{InputName, Origin, ScrollDirection},
    protocol::Notification,
};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, error, trace, warn};

use crate::{
    audio::{MuteSwitch, VolumeFader},
    events::{ControlEvent, EventSink},
    indicator::IndicatorLamp,
    pip::{PipTransform, SNAPSHOT_SLOT},
    playback::PlaybackTimer,
    scene::SceneSelector,
    surface::ControlSurface,
};

enum CustomRoute {
    Lamp(Arc<IndicatorLamp>),
    PipSnapshot,
    Scroll(ScrollDirection),
}

/// Routes each host notification to the one entity that owns it, always as a remote
/// observation so nothing is sent back.
pub struct ReconciliationRouter {
    scenes: Arc<SceneSelector>,
    mutes: HashMap<InputName, Arc<MuteSwitch>>,
    volumes: HashMap<InputName, Arc<VolumeFader>>,
    playback: HashMap<InputName, Arc<PlaybackTimer>>,
    pip: Arc<PipTransform>,
    custom: HashMap<String, CustomRoute>,
    events: EventSink,
}

impl ReconciliationRouter {
    pub fn new(surface: &ControlSurface) -> Self {
        let mut custom = HashMap::new();
        for lamp in surface.lamps() {
            custom.insert(lamp.slot().to_string(), CustomRoute::Lamp(lamp.clone()));
        }
        custom.insert(SNAPSHOT_SLOT.to_string(), CustomRoute::PipSnapshot);
        for direction in [ScrollDirection::Up, ScrollDirection::Down] {
            custom.insert(
                direction.event_field().to_string(),
                CustomRoute::Scroll(direction),
            );
        }

        let volume = surface.volume();
        let timer = surface.timer();
        Self {
            scenes: surface.scenes().clone(),
            mutes: surface
                .mutes()
                .map(|mute| (mute.input().clone(), mute.clone()))
                .collect(),
            volumes: HashMap::from([(volume.input().clone(), volume.clone())]),
            playback: HashMap::from([(timer.input().clone(), timer.clone())]),
            pip: surface.pip().clone(),
            custom,
            events: surface.events().clone(),
        }
    }

    /// Delivers one notification. Returns how many entities accepted it; a failing entity is
    /// logged and does not keep the others from being reached.
    pub async fn dispatch(&self, notification: Notification) -> usize {
        let kind = notification.kind();
        let outcome = match notification {
            Notification::CurrentProgramSceneChanged { scene_name } => {
                self.scenes.switch(&scene_name, Origin::Remote).await.map(|()| 1)
            }
            Notification::InputMuteStateChanged {
                input_name,
                input_muted,
            } => match self.mutes.get(&input_name) {
                Some(mute) => {
                    mute.observe(input_muted).await;
                    Ok(1)
                }
                None => Ok(0),
            },
            Notification::InputVolumeChanged {
                input_name,
                input_volume_db,
            } => match self.volumes.get(&input_name) {
                Some(fader) => {
                    fader.observe(input_volume_db).await;
                    Ok(1)
                }
                None => Ok(0),
            },
            Notification::MediaInputPlaybackStarted { input_name } => {
                match self.playback.get(&input_name) {
                    Some(timer) => {
                        timer.restart();
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
            Notification::CustomEvent(fields) => Ok(self.dispatch_custom(fields).await),
            Notification::ConnectionClosed { reason } => {
                error!(reason = %reason, "router: host connection lost");
                self.events.publish(ControlEvent::ConnectionLost(reason));
                Ok(1)
            }
        };

        match outcome {
            Ok(0) => {
                trace!(kind, "router: no entity interested");
                0
            }
            Ok(delivered) => delivered,
            Err(err) => {
                warn!(kind, "router: observation failed: {err}");
                0
            }
        }
    }

    /// Custom events may carry several fields; each is routed on its own.
    async fn dispatch_custom(&self, mut fields: Map<String, Value>) -> usize {
        // Older panels wrap the payload in another `eventData` object.
        if let Some(Value::Object(inner)) = fields.remove("eventData") {
            fields.extend(inner);
        }

        let mut delivered = 0;
        for (field, value) in fields {
            let Some(route) = self.custom.get(&field) else {
                trace!(field = %field, "router: custom field ignored");
                continue;
            };
            let result = match route {
                CustomRoute::Lamp(lamp) => lamp.observe(&value).await,
                CustomRoute::PipSnapshot => self.pip.observe_snapshot(&value).await,
                CustomRoute::Scroll(direction) => {
                    debug!(?direction, "router: notes scroll requested");
                    self.events.publish(ControlEvent::ScrollRequested(*direction));
                    Ok(())
                }
            };
            match result {
                Ok(()) => delivered += 1,
                Err(err) => warn!(field = %field, "router: custom event rejected: {err}"),
            }
        }
        delivered
    }

    /// Consumes notifications until the host connection is gone.
    pub async fn run(self, mut notifications: broadcast::Receiver<Notification>) {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    let closed = matches!(notification, Notification::ConnectionClosed { .. });
                    self.dispatch(notification).await;
                    if closed {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "router: fell behind, notifications dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("router: stopped");
    }

    pub fn spawn(self, notifications: broadcast::Receiver<Notification>) -> JoinHandle<()> {
        tokio::spawn(self.run(notifications))
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
