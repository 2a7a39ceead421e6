use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_newtype!(SceneName);
name_newtype!(InputName);
name_newtype!(EntityKey);

impl EntityKey {
    pub fn scene_selector() -> Self {
        Self::new("Scene")
    }

    pub fn scene(scene: &SceneName) -> Self {
        Self(format!("Scene:{scene}"))
    }

    pub fn mute(input: &InputName) -> Self {
        Self(format!("Mute:{input}"))
    }

    pub fn volume(input: &InputName) -> Self {
        Self(format!("Volume:{input}"))
    }

    pub fn pip() -> Self {
        Self::new("Pip")
    }

    pub fn lamp(slot: &str) -> Self {
        Self(format!("Lamp:{slot}"))
    }

    pub fn playback(input: &InputName) -> Self {
        Self(format!("Playback:{input}"))
    }
}

/// Who caused a state change: this controller, or the production host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    /// Custom-event field that carries this scroll request between controllers.
    pub fn event_field(self) -> &'static str {
        match self {
            ScrollDirection::Up => "notes_scroll_up",
            ScrollDirection::Down => "notes_scroll_down",
        }
    }

    /// Key name understood by the desktop keystroke tool.
    pub fn key_name(self) -> &'static str {
        match self {
            ScrollDirection::Up => "Up",
            ScrollDirection::Down => "Down",
        }
    }
}
