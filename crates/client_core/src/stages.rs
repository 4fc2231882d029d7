//! Pipeline-stage walkthrough and the gate in front of prediction.

use serde::{Deserialize, Serialize};
use shared::domain::PipelineStage;

use crate::training::TrainingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCursor {
    pub index: usize,
    pub visited_max: usize,
}

#[derive(Debug, Clone)]
pub struct StageViewer {
    stages: Vec<PipelineStage>,
    cursor: StageCursor,
}

impl StageViewer {
    /// `stages` must not be empty; settings validation guarantees it.
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        Self {
            stages,
            cursor: StageCursor {
                index: 0,
                visited_max: 0,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn cursor(&self) -> StageCursor {
        self.cursor
    }

    pub fn current(&self) -> usize {
        self.cursor.index
    }

    pub fn current_stage(&self) -> Option<&PipelineStage> {
        self.stages.get(self.cursor.index)
    }

    /// Returns whether the cursor moved.
    pub fn next(&mut self) -> bool {
        if self.cursor.index + 1 >= self.stages.len() {
            return false;
        }
        self.cursor.index += 1;
        self.cursor.visited_max = self.cursor.visited_max.max(self.cursor.index);
        true
    }

    pub fn previous(&mut self) -> bool {
        if self.cursor.index == 0 {
            return false;
        }
        self.cursor.index -= 1;
        true
    }

    /// True once the last stage has been reached, even after moving back.
    pub fn all_viewed(&self) -> bool {
        self.cursor.visited_max + 1 >= self.stages.len()
    }

    pub fn reset(&mut self) {
        self.cursor = StageCursor {
            index: 0,
            visited_max: 0,
        };
    }
}

pub fn can_proceed_to_prediction(status: TrainingStatus, all_viewed: bool) -> bool {
    status == TrainingStatus::Completed && all_viewed
}

/// Why the prediction button is (or is not) enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateHint {
    TrainingInProgress,
    TrainingFailed,
    ViewAllStages,
    Ready,
}

impl GateHint {
    pub fn evaluate(status: TrainingStatus, all_viewed: bool) -> Self {
        match status {
            TrainingStatus::Completed if all_viewed => GateHint::Ready,
            TrainingStatus::Completed => GateHint::ViewAllStages,
            TrainingStatus::Failed => GateHint::TrainingFailed,
            _ => GateHint::TrainingInProgress,
        }
    }

    pub fn caption(self) -> &'static str {
        match self {
            GateHint::TrainingInProgress => "Training in Progress...",
            GateHint::TrainingFailed => "Training Failed",
            GateHint::ViewAllStages => "View All Layers to Continue",
            GateHint::Ready => "Start Predicting",
        }
    }
}

#[cfg(test)]
#[path = "tests/stages_tests.rs"]
mod tests;
