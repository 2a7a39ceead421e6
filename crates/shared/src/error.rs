use std::fmt;

use thiserror::Error;

use crate::domain::{EntityKey, SceneName};

/// Failures talking to the production host. Never retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("production host unavailable: {0}")]
    Unavailable(String),
    #[error("{request_type} rejected by host (code {code}): {comment}")]
    Rejected {
        request_type: String,
        code: u16,
        comment: String,
    },
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneFailure {
    pub scene: SceneName,
    pub reason: String,
}

impl fmt::Display for SceneFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scene, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("{key}: value {value} outside {min}..={max}")]
    ValueOutOfRange {
        key: EntityKey,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("unknown {kind} '{name}'")]
    UnknownEntity { kind: &'static str, name: String },
    #[error(
        "transform update failed on {failed} of {attempted} scenes: {details}",
        failed = .failures.len(),
        details = join_failures(.failures)
    )]
    PartialTransformFailure {
        attempted: usize,
        failures: Vec<SceneFailure>,
    },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("macro '{0}' is already running")]
    MacroInFlight(String),
    #[error("invalid value for '{field}': {reason}")]
    InvalidPayload { field: String, reason: String },
}

impl ControlError {
    pub fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownEntity {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_payload(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Errors that leave the host in a usable state; sequences keep going after them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ControlError::UnknownEntity { .. } | ControlError::PartialTransformFailure { .. }
        )
    }
}

fn join_failures(failures: &[SceneFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_lists_every_failed_scene() {
        let err = ControlError::PartialTransformFailure {
            attempted: 5,
            failures: vec![
                SceneFailure {
                    scene: SceneName::new("Notes"),
                    reason: "timed out".to_string(),
                },
                SceneFailure {
                    scene: SceneName::new("Screenshare"),
                    reason: "no item".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "transform update failed on 2 of 5 scenes: Notes: timed out; Screenshare: no item"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn remote_failures_abort_sequences() {
        let err = ControlError::from(RemoteError::Unavailable("socket closed".to_string()));
        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "production host unavailable: socket closed"
        );
    }
}
