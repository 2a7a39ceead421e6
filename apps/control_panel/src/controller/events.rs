//! Backend-to-UI events and error modeling for the control panel.

use control_core::{presentation::Presentation, MacroReport};

pub enum PanelEvent {
    Info(String),
    /// Seeding finished; every entity's presentation as the host reported it.
    Ready(Vec<Presentation>),
    Presentation(Presentation),
    MacroFinished(MacroReport),
    ConnectionLost(String),
    Error(PanelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelErrorCategory {
    Auth,
    Transport,
    Rejected,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelErrorContext {
    BackendStartup,
    Command,
    Macro,
    Notes,
}

#[derive(Debug, Clone)]
pub struct PanelError {
    category: PanelErrorCategory,
    context: PanelErrorContext,
    message: String,
}

impl PanelError {
    pub fn from_message(context: PanelErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("authentication") || lower.contains("password") {
            PanelErrorCategory::Auth
        } else if lower.contains("rejected") {
            PanelErrorCategory::Rejected
        } else if lower.contains("outside")
            || lower.contains("unknown")
            || lower.contains("already running")
            || lower.contains("invalid")
        {
            PanelErrorCategory::Validation
        } else if lower.contains("unavailable")
            || lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("closed")
        {
            PanelErrorCategory::Transport
        } else {
            PanelErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> PanelErrorCategory {
        self.category
    }

    pub fn context(&self) -> PanelErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Short status-bar prefix.
    pub fn label(&self) -> &'static str {
        match self.category {
            PanelErrorCategory::Auth => "Auth",
            PanelErrorCategory::Transport => "Host",
            PanelErrorCategory::Rejected => "Rejected",
            PanelErrorCategory::Validation => "Input",
            PanelErrorCategory::Unknown => "Error",
        }
    }
}
