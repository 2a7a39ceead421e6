//! UI layer: the single control window and its colour scheme.

pub mod app;
pub mod theme;

pub use app::ControlPanelApp;
