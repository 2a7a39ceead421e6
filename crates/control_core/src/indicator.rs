use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{domain::EntityKey, error::ControlError};
use tracing::{debug, info, warn};

use crate::{
    config::LampSpec,
    entity::{Observation, SyncedValue},
    events::EventSink,
    persistent::PersistentShared,
    presentation::{ColorClass, Presentable, Presentation, PresentedValue},
};

/// On/off lamp every connected controller converges on.
pub struct IndicatorLamp {
    persistent: Arc<PersistentShared>,
    events: EventSink,
    spec: LampSpec,
    slot: String,
    on: SyncedValue<bool>,
}

impl IndicatorLamp {
    pub fn new(
        persistent: Arc<PersistentShared>,
        events: EventSink,
        spec: LampSpec,
        echo_grace: Duration,
    ) -> Self {
        let slot = spec.slot();
        Self {
            persistent,
            events,
            on: SyncedValue::new(EntityKey::lamp(&slot), false, echo_grace),
            slot,
            spec,
        }
    }

    pub fn spec(&self) -> &LampSpec {
        &self.spec
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub async fn is_on(&self) -> bool {
        self.on.current().await
    }

    pub async fn apply(&self, on: bool) -> Result<(), ControlError> {
        let staged = self.on.stage_local(on).await;
        self.publish().await;
        if let Err(err) = self.persistent.publish(&self.slot, json!(on)).await {
            warn!(lamp = %self.spec.name, on, "lamp: publish failed: {err}");
            if self.on.revert_local(staged).await {
                self.publish().await;
            }
            return Err(err.into());
        }
        info!(lamp = %self.spec.name, on, "lamp: set");
        Ok(())
    }

    pub async fn toggle(&self) -> Result<(), ControlError> {
        let on = self.is_on().await;
        self.apply(!on).await
    }

    pub async fn observe(&self, value: &Value) -> Result<(), ControlError> {
        let on = value
            .as_bool()
            .ok_or_else(|| ControlError::invalid_payload(&self.slot, "expected true or false"))?;
        match self.on.observe(on).await {
            Observation::Changed => info!(lamp = %self.spec.name, on, "lamp: changed elsewhere"),
            _ => debug!(lamp = %self.spec.name, on, "lamp: confirmed"),
        }
        self.publish().await;
        Ok(())
    }

    /// Stored state from earlier sessions; anything other than `true` reads as off.
    pub async fn seed(&self) -> Result<(), ControlError> {
        let stored = self.persistent.load(&self.slot).await?;
        let on = stored.as_ref().and_then(Value::as_bool).unwrap_or(false);
        self.on.observe(on).await;
        self.publish().await;
        Ok(())
    }

    async fn publish(&self) {
        self.events.presentations(self.presentations().await);
    }
}

#[async_trait]
impl Presentable for IndicatorLamp {
    fn key(&self) -> &EntityKey {
        self.on.key()
    }

    async fn presentations(&self) -> Vec<Presentation> {
        let on = self.is_on().await;
        vec![Presentation {
            key: self.key().clone(),
            value: PresentedValue::Flag(on),
            text: self.spec.label.clone(),
            color: if on {
                ColorClass::Active
            } else {
                ColorClass::Neutral
            },
        }]
    }
}
