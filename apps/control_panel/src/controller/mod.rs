//! Controller layer: backend events, error classification, and command dispatch.

pub mod events;
pub mod orchestration;
