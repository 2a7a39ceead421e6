use shared::domain::ScrollDirection;
use tokio::sync::broadcast;

use crate::{presentation::Presentation, sequencer::MacroReport};

const EVENT_CAPACITY: usize = 512;

/// Everything the View needs to hear about without polling.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    PresentationChanged(Presentation),
    ScrollRequested(ScrollDirection),
    MacroFinished(MacroReport),
    ConnectionLost(String),
    Error(String),
}

#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<ControlEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Dropped silently when nobody listens.
    pub fn publish(&self, event: ControlEvent) {
        let _ = self.tx.send(event);
    }

    pub fn presentations(&self, presentations: Vec<Presentation>) {
        for presentation in presentations {
            self.publish(ControlEvent::PresentationChanged(presentation));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
