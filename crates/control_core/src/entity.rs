//! The synchronized value holder every control entity is built on.
//!
//! A value changes through exactly two doors: `stage_local` (an operator command that is
//! about to be sent) and `observe` (a value confirmed by the production host). `observe`
//! always wins; the pending echo only tells the caller whether the observation was the
//! value it sent, come back within the grace period.

use std::time::Duration;

use shared::domain::EntityKey;
use tokio::{sync::RwLock, time::Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The awaited echo of our own command arrived.
    Echo,
    Changed,
    Unchanged,
}

/// Receipt for an optimistic local write, used to undo it when the command fails.
#[derive(Debug, Clone)]
pub struct Staged<V> {
    previous: V,
    generation: u64,
}

struct PendingEcho<V> {
    value: V,
    deadline: Instant,
}

struct SyncState<V> {
    current: V,
    pending_echo: Option<PendingEcho<V>>,
    generation: u64,
}

pub struct SyncedValue<V> {
    key: EntityKey,
    echo_grace: Duration,
    state: RwLock<SyncState<V>>,
}

impl<V> SyncedValue<V>
where
    V: Clone + PartialEq + Send + Sync,
{
    pub fn new(key: EntityKey, initial: V, echo_grace: Duration) -> Self {
        Self {
            key,
            echo_grace,
            state: RwLock::new(SyncState {
                current: initial,
                pending_echo: None,
                generation: 0,
            }),
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub async fn current(&self) -> V {
        self.state.read().await.current.clone()
    }

    /// Optimistic local write; arms the echo guard for the grace period.
    pub async fn stage_local(&self, value: V) -> Staged<V> {
        let mut state = self.state.write().await;
        let previous = std::mem::replace(&mut state.current, value.clone());
        state.generation += 1;
        state.pending_echo = Some(PendingEcho {
            value,
            deadline: Instant::now() + self.echo_grace,
        });
        Staged {
            previous,
            generation: state.generation,
        }
    }

    /// Host-confirmed value. Always applied, including self-echoes. Any observation ends the
    /// wait; only the staged value itself counts as the echo.
    pub async fn observe(&self, value: V) -> Observation {
        let mut state = self.state.write().await;
        let awaited = state
            .pending_echo
            .take()
            .is_some_and(|echo| Instant::now() < echo.deadline && echo.value == value);
        let changed = state.current != value;
        state.current = value;
        state.generation += 1;
        if awaited {
            Observation::Echo
        } else if changed {
            Observation::Changed
        } else {
            Observation::Unchanged
        }
    }

    /// Undoes a failed local write unless something newer has landed since. Returns whether
    /// the value was rolled back.
    pub async fn revert_local(&self, staged: Staged<V>) -> bool {
        let mut state = self.state.write().await;
        if state.generation != staged.generation {
            return false;
        }
        state.current = staged.previous;
        state.pending_echo = None;
        state.generation += 1;
        true
    }

    pub async fn awaiting_echo(&self) -> bool {
        self.state
            .read()
            .await
            .pending_echo
            .as_ref()
            .is_some_and(|echo| Instant::now() < echo.deadline)
    }
}
