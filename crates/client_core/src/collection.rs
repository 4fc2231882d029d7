//! Walks the label catalog, one saved drawing per label.

use serde::Serialize;
use shared::{
    domain::{Label, LabelCatalog},
    error::BackendError,
};
use tracing::{debug, info};

use crate::{drawing::DrawingArtifact, error::WorkflowError, TutorialBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionProgress {
    pub current_index: usize,
    pub total: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionStep {
    /// Saved; the next label is now current and the surface should be reset.
    Advance { next: Label },
    /// The last label was saved.
    Complete,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(#[from] WorkflowError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct SymbolCollectionSequencer {
    catalog: LabelCatalog,
    current_index: usize,
    completed: bool,
}

impl SymbolCollectionSequencer {
    pub fn new(catalog: LabelCatalog) -> Self {
        Self {
            catalog,
            current_index: 0,
            completed: false,
        }
    }

    pub fn reset(&mut self) {
        self.current_index = 0;
        self.completed = false;
    }

    /// `None` once every label has been collected.
    pub fn current_label(&self) -> Option<&Label> {
        if self.completed {
            None
        } else {
            self.catalog.get(self.current_index)
        }
    }

    pub fn progress(&self) -> CollectionProgress {
        CollectionProgress {
            current_index: self.current_index,
            total: self.catalog.len(),
            completed: self.completed,
        }
    }

    /// Saves `artifact` for the current label. The cursor moves only after
    /// the backend confirms the save.
    pub async fn submit(
        &mut self,
        backend: &dyn TutorialBackend,
        artifact: &DrawingArtifact,
    ) -> Result<CollectionStep, SubmitError> {
        let label = self
            .current_label()
            .cloned()
            .ok_or(WorkflowError::CollectionComplete)?;

        backend.save_drawing(artifact, &label).await?;
        debug!(label = %label, index = self.current_index, "collection: drawing saved");

        Ok(self.record_saved())
    }

    fn record_saved(&mut self) -> CollectionStep {
        match self.catalog.get(self.current_index + 1).cloned() {
            Some(next) => {
                self.current_index += 1;
                CollectionStep::Advance { next }
            }
            None => {
                self.completed = true;
                info!(total = self.catalog.len(), "collection: all labels collected");
                CollectionStep::Complete
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/collection_tests.rs"]
mod tests;
