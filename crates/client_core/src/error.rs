//! Failure kinds surfaced by the workflow.

use serde::Serialize;
use shared::domain::Label;
use thiserror::Error;

use crate::workflow::WorkflowPhase;

/// Asynchronous failures. These are recorded as workflow state and shown to
/// the user; none of them aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WorkflowFailure {
    #[error("failed to save drawing for '{label}': {message}")]
    Save { label: Label, message: String },
    #[error("failed to start training: {0}")]
    TrainStart(String),
    #[error("training failed: {0}")]
    TrainingFailed(String),
    #[error("prediction failed: {0}")]
    Predict(String),
    #[error("failed to load image for stage {stage_index}: {message}")]
    StageImage { stage_index: usize, message: String },
}

/// Commands issued in a state that cannot accept them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("command requires phase {expected:?}, workflow is in {actual:?}")]
    WrongPhase {
        expected: WorkflowPhase,
        actual: WorkflowPhase,
    },
    #[error("all labels have already been collected")]
    CollectionComplete,
    #[error("prediction is locked until training completes and every stage was viewed")]
    GateClosed,
    #[error("another {0} request is still pending")]
    Busy(&'static str),
    #[error("training can only be restarted after a failure")]
    TrainingNotFailed,
}
