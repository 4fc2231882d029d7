use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TRAINING_PROGRESS_CHANNEL: &str = "training_progress";
pub const TRAINING_COMPLETE_CHANNEL: &str = "training_complete";
pub const TRAINING_ERROR_CHANNEL: &str = "training_error";

/// Lifecycle notification pushed by the backend during a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum TrainingEvent {
    Progress(f32),
    Complete,
    Error(String),
}

impl TrainingEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            TrainingEvent::Progress(_) => TRAINING_PROGRESS_CHANNEL,
            TrainingEvent::Complete => TRAINING_COMPLETE_CHANNEL,
            TrainingEvent::Error(_) => TRAINING_ERROR_CHANNEL,
        }
    }

    /// Decodes a notification emitted on one of the three named channels.
    ///
    /// Returns `None` for unknown channels and for progress payloads that are
    /// not numbers. Error payloads that are not strings are rendered as JSON.
    pub fn from_channel(channel: &str, payload: &Value) -> Option<Self> {
        match channel {
            TRAINING_PROGRESS_CHANNEL => payload
                .as_f64()
                .filter(|value| value.is_finite())
                .map(|value| TrainingEvent::Progress(value as f32)),
            TRAINING_COMPLETE_CHANNEL => Some(TrainingEvent::Complete),
            TRAINING_ERROR_CHANNEL => Some(TrainingEvent::Error(
                payload
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| payload.to_string()),
            )),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrainingEvent::Progress(_))
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
