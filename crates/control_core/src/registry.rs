use std::{collections::BTreeMap, sync::Arc};

use shared::domain::EntityKey;

use crate::presentation::{Presentable, Presentation};

/// Every presentable entity, by key. Owned by the surface and handed to the View by reference.
#[derive(Default)]
pub struct EntityRegistry {
    entries: BTreeMap<EntityKey, Arc<dyn Presentable>>,
}

impl EntityRegistry {
    pub fn register(&mut self, entity: Arc<dyn Presentable>) {
        self.entries.insert(entity.key().clone(), entity);
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Arc<dyn Presentable>> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn presentations(&self) -> Vec<Presentation> {
        let mut all = Vec::new();
        for entity in self.entries.values() {
            all.extend(entity.presentations().await);
        }
        all
    }
}
