//! Orchestration core for the draw → train → review → predict tutorial.
//!
//! The backend that stores samples, trains the model and answers predictions
//! is reached only through [`TutorialBackend`]; everything in this crate is the
//! client-side state machine around it.

use async_trait::async_trait;
use shared::{domain::Label, error::BackendError, protocol::TrainingEvent};
use tokio::sync::broadcast;

pub mod collection;
pub mod config;
pub mod drawing;
pub mod error;
pub mod estimator;
pub mod stages;
pub mod task;
pub mod training;
pub mod workflow;

pub use collection::{CollectionProgress, CollectionStep, SymbolCollectionSequencer};
pub use config::{load_settings, Settings};
pub use drawing::{DrawingArtifact, DrawingSurface, Point};
pub use error::{WorkflowError, WorkflowFailure};
pub use estimator::ProgressEstimator;
pub use stages::{can_proceed_to_prediction, GateHint, StageViewer};
pub use task::{AsyncTaskHandle, TaskState};
pub use training::{TrainingEventBridge, TrainingSession, TrainingSignal, TrainingStatus};
pub use workflow::{
    PredictionResult, StageImage, WorkflowController, WorkflowEvent, WorkflowPhase, WorkflowView,
};

#[async_trait]
pub trait TutorialBackend: Send + Sync {
    async fn save_drawing(
        &self,
        artifact: &DrawingArtifact,
        label: &Label,
    ) -> Result<(), BackendError>;
    /// Starts a training run. Returns once the run is accepted; progress and
    /// the outcome arrive on [`TutorialBackend::subscribe_training_events`].
    async fn train(&self) -> Result<(), BackendError>;
    async fn predict(&self, artifact: &DrawingArtifact) -> Result<u32, BackendError>;
    /// Picture illustrating what the pipeline stage at `stage_index` does
    /// to the collected samples.
    async fn stage_image(&self, stage_index: usize) -> Result<DrawingArtifact, BackendError>;
    fn subscribe_training_events(&self) -> broadcast::Receiver<TrainingEvent>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
