use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SessionState;

/// Broad error category used by callers to decide how to surface a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimelineErrorCategory {
    /// Structurally invalid input, for example an unparsable timestamp.
    InvalidInput,
    /// Operation issued in a state that cannot accept it.
    InvalidState,
    /// Serialization/deserialization failure at the boundary.
    Serialization,
    /// Internal bug or invariant break.
    Internal,
}

/// Stable error payload returned by engine operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct TimelineError {
    /// High-level error category.
    pub category: TimelineErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl TimelineError {
    /// Construct a new timeline error.
    pub fn new(
        category: TimelineErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// A raw timestamp could not be converted to an absolute instant.
    pub fn invalid_timestamp(message_id: impl std::fmt::Display, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            TimelineErrorCategory::InvalidInput,
            "invalid_timestamp",
            format!("message '{message_id}' has an invalid timestamp: {detail}"),
        )
    }

    /// An append-class operation referenced a room that was never seeded.
    pub fn unknown_room(room_id: &str, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            TimelineErrorCategory::InvalidState,
            "unknown_room",
            format!("cannot run '{action}' for room '{room_id}': room was never seeded"),
        )
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: SessionState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            TimelineErrorCategory::InvalidState,
            "invalid_state_transition",
            format!("cannot run '{action}' while session is in state {current:?}"),
        )
    }

    /// Wrap a decode failure from the transport boundary.
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::new(
            TimelineErrorCategory::Serialization,
            "decode_failed",
            err.to_string(),
        )
    }

    /// Whether the caller can keep feeding events after this error.
    ///
    /// Bad input only poisons the event that carried it; state errors point at
    /// an upstream ordering bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category,
            TimelineErrorCategory::InvalidInput | TimelineErrorCategory::Serialization
        )
    }
}

impl From<serde_json::Error> for TimelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_invalid_state_error_code_stable() {
        let err = TimelineError::invalid_state(SessionState::Cold, "live_message");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(err.category, TimelineErrorCategory::InvalidState);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn unknown_room_names_room_and_action() {
        let err = TimelineError::unknown_room("r9", "append_live");
        assert_eq!(err.code, "unknown_room");
        assert!(err.message.contains("r9"));
        assert!(err.message.contains("append_live"));
    }

    #[test]
    fn invalid_input_is_recoverable() {
        let err = TimelineError::invalid_timestamp("7", "not a date");
        assert_eq!(err.category, TimelineErrorCategory::InvalidInput);
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "InvalidInput:invalid_timestamp: message '7' has an invalid timestamp: not a date"
        );
    }

    #[test]
    fn maps_json_errors_to_serialization_category() {
        let err: TimelineError = serde_json::from_str::<u8>("nope")
            .expect_err("should not decode")
            .into();
        assert_eq!(err.category, TimelineErrorCategory::Serialization);
    }
}
