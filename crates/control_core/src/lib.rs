//! Echo-safe mirror of the production host's state: one synchronized entity per remote
//! property, the router that feeds host notifications back into them, and the macro
//! sequencer that chains their commands.

pub mod audio;
pub mod config;
pub mod crop;
pub mod entity;
pub mod events;
pub mod indicator;
pub mod persistent;
pub mod pip;
pub mod playback;
pub mod presentation;
pub mod registry;
pub mod router;
pub mod scene;
pub mod sequencer;
pub mod surface;

pub use config::PanelConfig;
pub use events::{ControlEvent, EventSink};
pub use router::ReconciliationRouter;
pub use sequencer::{MacroReport, MacroRun, MacroSequencer};
pub use surface::ControlSurface;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
