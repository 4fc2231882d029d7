use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use shared::{
    domain::{Label, LabelCatalog},
    error::BackendError,
    protocol::TrainingEvent,
};
use tokio::sync::{broadcast, Mutex, Notify};

use crate::{
    config::{CanvasSettings, EstimatorSettings, Settings},
    drawing::DrawingArtifact,
    TutorialBackend,
};

pub struct TestBackend {
    pub saved: Mutex<Vec<Label>>,
    pub save_failures: Mutex<VecDeque<BackendError>>,
    pub save_gate: Option<Arc<Notify>>,
    pub train_calls: AtomicUsize,
    pub train_failure: Mutex<Option<BackendError>>,
    pub predictions: Mutex<VecDeque<Result<u32, BackendError>>>,
    pub predict_calls: AtomicUsize,
    pub stage_image_failures: Mutex<HashMap<usize, BackendError>>,
    pub stage_image_calls: AtomicUsize,
    pub events: broadcast::Sender<TrainingEvent>,
}

impl TestBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// Every save waits for one `notify_one` on the returned gate.
    pub fn gated() -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (Arc::new(Self::build(Some(Arc::clone(&gate)))), gate)
    }

    fn build(save_gate: Option<Arc<Notify>>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            saved: Mutex::new(Vec::new()),
            save_failures: Mutex::new(VecDeque::new()),
            save_gate,
            train_calls: AtomicUsize::new(0),
            train_failure: Mutex::new(None),
            predictions: Mutex::new(VecDeque::new()),
            predict_calls: AtomicUsize::new(0),
            stage_image_failures: Mutex::new(HashMap::new()),
            stage_image_calls: AtomicUsize::new(0),
            events,
        }
    }

    pub async fn fail_next_save(&self, message: &str) {
        self.save_failures
            .lock()
            .await
            .push_back(BackendError::unavailable(message));
    }

    pub async fn fail_next_train(&self, message: &str) {
        *self.train_failure.lock().await = Some(BackendError::internal(message));
    }

    pub async fn queue_prediction(&self, result: Result<u32, BackendError>) {
        self.predictions.lock().await.push_back(result);
    }

    /// Every image request for `stage_index` fails until cleared.
    pub async fn fail_stage_image(&self, stage_index: usize, message: &str) {
        self.stage_image_failures
            .lock()
            .await
            .insert(stage_index, BackendError::unavailable(message));
    }

    pub fn stage_image_calls(&self) -> usize {
        self.stage_image_calls.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: TrainingEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn subscribers(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn train_calls(&self) -> usize {
        self.train_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TutorialBackend for TestBackend {
    async fn save_drawing(
        &self,
        _artifact: &DrawingArtifact,
        label: &Label,
    ) -> Result<(), BackendError> {
        if let Some(gate) = &self.save_gate {
            gate.notified().await;
        }
        if let Some(err) = self.save_failures.lock().await.pop_front() {
            return Err(err);
        }
        self.saved.lock().await.push(label.clone());
        Ok(())
    }

    async fn train(&self) -> Result<(), BackendError> {
        self.train_calls.fetch_add(1, Ordering::SeqCst);
        match self.train_failure.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn predict(&self, _artifact: &DrawingArtifact) -> Result<u32, BackendError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        self.predictions
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::unavailable("no prediction queued")))
    }

    async fn stage_image(&self, stage_index: usize) -> Result<DrawingArtifact, BackendError> {
        self.stage_image_calls.fetch_add(1, Ordering::SeqCst);
        match self.stage_image_failures.lock().await.get(&stage_index) {
            Some(err) => Err(err.clone()),
            None => Ok(DrawingArtifact::from_base64(format!("stage-{stage_index}"))),
        }
    }

    fn subscribe_training_events(&self) -> broadcast::Receiver<TrainingEvent> {
        self.events.subscribe()
    }
}

pub fn catalog(labels: &[&str]) -> LabelCatalog {
    LabelCatalog::new(labels.iter().copied()).expect("catalog")
}

/// Three labels, three stages, a tiny canvas and a deterministic estimator.
pub fn scenario_settings() -> Settings {
    Settings {
        labels: vec!["0".into(), "1".into(), "2".into()],
        stages: shared::domain::PipelineStage::default_pipeline()
            .into_iter()
            .take(3)
            .collect(),
        canvas: CanvasSettings {
            width: 28,
            height: 28,
            brush_radius: 1.5,
            ..CanvasSettings::default()
        },
        estimator: EstimatorSettings {
            seed: Some(42),
            ..EstimatorSettings::default()
        },
    }
}
