//! Composes collection, training, stage review and prediction into one run.
//!
//! The controller is the only writer of the collection cursor, the training
//! session and the stage cursor. The event bridge and the estimator run as
//! separate tasks but only propose transitions through [`TrainingSession`],
//! whose rules keep progress monotonic and terminal states sticky.
//!
//! Every asynchronous continuation remembers the [`RunId`] it started under
//! and is dropped once [`WorkflowController::reset_workflow`] has moved on.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::Serialize;
use shared::domain::{Label, LabelCatalog, RunId};
use tokio::{
    sync::{broadcast, Mutex, MutexGuard},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    collection::{CollectionProgress, CollectionStep, SymbolCollectionSequencer},
    config::Settings,
    drawing::{DrawingArtifact, DrawingSurface, Point},
    error::{WorkflowError, WorkflowFailure},
    estimator::{EstimatorTask, ProgressEstimator},
    stages::{can_proceed_to_prediction, GateHint, StageViewer},
    task::{AsyncTaskHandle, TaskState},
    training::{
        SharedSession, TrainingEventBridge, TrainingSession, TrainingSignal, TrainingSignalSink,
        TrainingStatus,
    },
    TutorialBackend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Collecting,
    Training,
    Predicting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub class_index: u32,
    /// Catalog label at `class_index`, when there is one.
    pub label: Option<Label>,
    #[serde(skip_serializing)]
    pub artifact: DrawingArtifact,
}

/// Visualization of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageImage {
    pub stage_index: usize,
    pub artifact: DrawingArtifact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum WorkflowEvent {
    LabelAdvanced { index: usize, label: Label },
    CollectionCompleted,
    TrainingStatusChanged(TrainingStatus),
    Training(TrainingSignal),
    StageChanged { index: usize, all_viewed: bool },
    StageImageReady { index: usize },
    GateOpened,
    PhaseChanged(WorkflowPhase),
    PredictionReady(PredictionResult),
    Failure(WorkflowFailure),
}

/// Read-only state handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub run_id: RunId,
    pub phase: WorkflowPhase,
    pub current_label: Option<Label>,
    pub collection_index: usize,
    pub collection_total: usize,
    pub collection_completed: bool,
    pub save_pending: bool,
    pub save_error_message: Option<String>,
    pub training_status: TrainingStatus,
    pub training_percent: f32,
    pub training_error_message: Option<String>,
    pub current_stage_index: usize,
    pub current_stage_title: Option<String>,
    pub stage_count: usize,
    pub all_stages_viewed: bool,
    pub stage_image: Option<StageImage>,
    pub stage_image_pending: bool,
    pub stage_image_error_message: Option<String>,
    pub can_proceed_to_predict: bool,
    pub gate_hint: GateHint,
    pub prediction: Option<PredictionResult>,
    pub prediction_pending: bool,
    pub prediction_error_message: Option<String>,
}

struct WorkflowState {
    run_id: RunId,
    phase: WorkflowPhase,
    stages: StageViewer,
    surface: DrawingSurface,
    collection: CollectionProgress,
    current_label: Option<Label>,
    gate_open: bool,
    closed: bool,
}

/// Swapped for a fresh sequencer on reset so an in-flight save never blocks
/// it.
type SharedSequencer = Arc<Mutex<SymbolCollectionSequencer>>;

struct ActiveTraining {
    run_id: RunId,
    bridge: TrainingEventBridge,
    estimator: EstimatorTask,
}

impl ActiveTraining {
    async fn release(self) {
        let ActiveTraining {
            run_id,
            bridge,
            mut estimator,
        } = self;
        estimator.stop().await;
        bridge.detach().await;
        debug!(run = %run_id, "workflow: training subscriptions released");
    }
}

pub struct WorkflowController {
    backend: Arc<dyn TutorialBackend>,
    settings: Settings,
    catalog: LabelCatalog,
    inner: Mutex<WorkflowState>,
    collection: Mutex<SharedSequencer>,
    session: Mutex<SharedSession>,
    active_training: Mutex<Option<ActiveTraining>>,
    save: AsyncTaskHandle<CollectionStep, WorkflowFailure>,
    train: AsyncTaskHandle<(), WorkflowFailure>,
    predict: AsyncTaskHandle<PredictionResult, WorkflowFailure>,
    stage_image: AsyncTaskHandle<StageImage, WorkflowFailure>,
    /// Fetch for the stage on screen; replaced on every stage change.
    stage_image_task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<WorkflowEvent>,
}

fn ensure_phase(actual: WorkflowPhase, expected: WorkflowPhase) -> Result<(), WorkflowError> {
    if actual == expected {
        Ok(())
    } else {
        Err(WorkflowError::WrongPhase { expected, actual })
    }
}

impl WorkflowController {
    pub fn new(backend: Arc<dyn TutorialBackend>, settings: Settings) -> anyhow::Result<Arc<Self>> {
        settings.validate()?;
        let catalog = settings.label_catalog()?;
        let run_id = RunId::new();
        let (events, _) = broadcast::channel(256);

        info!(
            run = %run_id,
            labels = catalog.len(),
            stages = settings.stages.len(),
            "workflow: run started"
        );

        Ok(Arc::new(Self {
            inner: Mutex::new(WorkflowState {
                run_id,
                phase: WorkflowPhase::Collecting,
                stages: StageViewer::new(settings.stages.clone()),
                surface: DrawingSurface::new(settings.canvas.clone()),
                collection: CollectionProgress {
                    current_index: 0,
                    total: catalog.len(),
                    completed: false,
                },
                current_label: catalog.get(0).cloned(),
                gate_open: false,
                closed: false,
            }),
            collection: Mutex::new(Arc::new(Mutex::new(SymbolCollectionSequencer::new(
                catalog.clone(),
            )))),
            session: Mutex::new(TrainingSession::shared()),
            active_training: Mutex::new(None),
            save: AsyncTaskHandle::new("save"),
            train: AsyncTaskHandle::new("train"),
            predict: AsyncTaskHandle::new("predict"),
            stage_image: AsyncTaskHandle::new("stage_image"),
            stage_image_task: Mutex::new(None),
            backend,
            settings,
            catalog,
            events,
        }))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn run_id(&self) -> RunId {
        self.inner.lock().await.run_id
    }

    fn publish(&self, event: WorkflowEvent) {
        let _ = self.events.send(event);
    }

    async fn lock_run(&self, run_id: RunId) -> Option<MutexGuard<'_, WorkflowState>> {
        let inner = self.inner.lock().await;
        (inner.run_id == run_id && !inner.closed).then_some(inner)
    }

    async fn is_current(&self, run_id: RunId) -> bool {
        self.lock_run(run_id).await.is_some()
    }

    pub(crate) async fn session_handle(&self) -> SharedSession {
        Arc::clone(&*self.session.lock().await)
    }

    async fn sequencer_handle(&self) -> SharedSequencer {
        Arc::clone(&*self.collection.lock().await)
    }

    pub(crate) async fn training_tasks_active(&self) -> bool {
        self.active_training.lock().await.is_some()
    }

    pub async fn snapshot(&self) -> WorkflowView {
        let inner = self.inner.lock().await;
        let session = self.session_handle().await;
        let session = session.lock().await;
        let status = session.status();
        let all_viewed = inner.stages.all_viewed();
        let prediction = self.predict.state();
        let stage_image = self.stage_image.state();

        WorkflowView {
            run_id: inner.run_id,
            phase: inner.phase,
            current_label: inner.current_label.clone(),
            collection_index: inner.collection.current_index,
            collection_total: inner.collection.total,
            collection_completed: inner.collection.completed,
            save_pending: self.save.is_pending(),
            save_error_message: self.save.state().failed().map(ToString::to_string),
            training_status: status,
            training_percent: session.progress_percent(),
            training_error_message: session.error_message().map(str::to_string),
            current_stage_index: inner.stages.current(),
            current_stage_title: inner.stages.current_stage().map(|stage| stage.title.clone()),
            stage_count: inner.stages.len(),
            all_stages_viewed: all_viewed,
            stage_image: stage_image.succeeded().cloned(),
            stage_image_pending: stage_image.is_pending(),
            stage_image_error_message: stage_image.failed().map(ToString::to_string),
            can_proceed_to_predict: can_proceed_to_prediction(status, all_viewed),
            gate_hint: GateHint::evaluate(status, all_viewed),
            prediction: prediction.succeeded().cloned(),
            prediction_pending: prediction.is_pending(),
            prediction_error_message: prediction.failed().map(ToString::to_string),
        }
    }

    pub async fn begin_stroke(&self, point: Point) {
        self.inner.lock().await.surface.begin_stroke(point);
    }

    pub async fn extend_stroke(&self, point: Point) {
        self.inner.lock().await.surface.extend_stroke(point);
    }

    pub async fn end_stroke(&self) {
        self.inner.lock().await.surface.end_stroke();
    }

    /// Clears the canvas. On the prediction screen this also drops the last
    /// prediction and its error.
    pub async fn clear_drawing(&self) {
        let mut inner = self.inner.lock().await;
        inner.surface.clear();
        if inner.phase == WorkflowPhase::Predicting {
            self.predict.reset();
        }
    }

    /// Saves the current drawing for the current label.
    ///
    /// A backend failure is returned as `TaskState::Failed` and leaves the
    /// label in place for a retry; `Err` is reserved for commands the
    /// workflow cannot accept right now.
    pub async fn submit_drawing(
        self: &Arc<Self>,
    ) -> Result<TaskState<CollectionStep, WorkflowFailure>, WorkflowError> {
        let (run_id, label, artifact) = {
            let inner = self.inner.lock().await;
            ensure_phase(inner.phase, WorkflowPhase::Collecting)?;
            if self.save.is_pending() {
                return Err(WorkflowError::Busy("save"));
            }
            let label = inner
                .current_label
                .clone()
                .ok_or(WorkflowError::CollectionComplete)?;
            (inner.run_id, label, inner.surface.export())
        };

        let backend = Arc::clone(&self.backend);
        let outcome = self
            .save
            .run(|| async move {
                let artifact = artifact.map_err(|err| WorkflowFailure::Save {
                    label: label.clone(),
                    message: format!("failed to encode drawing: {err}"),
                })?;
                let sequencer = self.sequencer_handle().await;
                let mut sequencer = sequencer.lock().await;
                if !self.is_current(run_id).await {
                    return Err(WorkflowFailure::Save {
                        label,
                        message: "workflow was reset".to_string(),
                    });
                }
                sequencer
                    .submit(backend.as_ref(), &artifact)
                    .await
                    .map_err(|err| WorkflowFailure::Save {
                        label,
                        message: err.to_string(),
                    })
            })
            .await;

        match &outcome {
            TaskState::Succeeded(step) => {
                let progress = self.sequencer_handle().await.lock().await.progress();
                let Some(mut inner) = self.lock_run(run_id).await else {
                    debug!(run = %run_id, "workflow: save finished after reset, discarded");
                    return Ok(outcome);
                };
                inner.surface.clear();
                inner.collection = progress;
                match step {
                    CollectionStep::Advance { next } => {
                        inner.current_label = Some(next.clone());
                        drop(inner);
                        info!(
                            run = %run_id,
                            label = %next,
                            index = progress.current_index,
                            total = progress.total,
                            "workflow: drawing saved, next label"
                        );
                        self.publish(WorkflowEvent::LabelAdvanced {
                            index: progress.current_index,
                            label: next.clone(),
                        });
                    }
                    CollectionStep::Complete => {
                        inner.current_label = None;
                        inner.phase = WorkflowPhase::Training;
                        drop(inner);
                        info!(run = %run_id, total = progress.total, "workflow: collection complete");
                        self.publish(WorkflowEvent::CollectionCompleted);
                        self.publish(WorkflowEvent::PhaseChanged(WorkflowPhase::Training));
                        self.show_stage_image(run_id, 0).await;
                        self.start_training(run_id).await;
                    }
                }
            }
            TaskState::Failed(failure) => {
                if self.is_current(run_id).await {
                    warn!(run = %run_id, "workflow: {failure}");
                    self.publish(WorkflowEvent::Failure(failure.clone()));
                }
            }
            TaskState::Pending | TaskState::Idle => return Err(WorkflowError::Busy("save")),
        }

        Ok(outcome)
    }

    async fn start_training(self: &Arc<Self>, run_id: RunId) {
        let session = self.session_handle().await;
        {
            let mut guard = session.lock().await;
            if !guard.request() {
                debug!(
                    run = %run_id,
                    status = ?guard.status(),
                    "workflow: training already requested, trigger ignored"
                );
                return;
            }
        }
        info!(run = %run_id, "workflow: training requested");
        self.publish(WorkflowEvent::TrainingStatusChanged(TrainingStatus::Requested));

        // Subscribe before triggering so no early event is missed.
        let sink: Arc<dyn TrainingSignalSink> = Arc::new(SignalForwarder {
            controller: Arc::downgrade(self),
            run_id,
        });
        let active = ActiveTraining {
            run_id,
            bridge: TrainingEventBridge::attach(
                self.backend.subscribe_training_events(),
                Arc::clone(&session),
                Arc::clone(&sink),
            ),
            estimator: EstimatorTask::spawn(
                ProgressEstimator::from_settings(&self.settings.estimator),
                Arc::clone(&session),
                sink,
            ),
        };

        let installed = match self.lock_run(run_id).await {
            Some(_inner) => Ok(self.active_training.lock().await.replace(active)),
            None => Err(active),
        };
        match installed {
            Ok(Some(previous)) => previous.release().await,
            Ok(None) => {}
            Err(orphan) => {
                orphan.release().await;
                return;
            }
        }

        let backend = Arc::clone(&self.backend);
        let outcome = self
            .train
            .run(|| async move {
                backend
                    .train()
                    .await
                    .map_err(|err| WorkflowFailure::TrainStart(err.message))
            })
            .await;

        if !self.is_current(run_id).await {
            return;
        }
        match outcome {
            TaskState::Succeeded(()) => {
                if session.lock().await.mark_running() {
                    info!(run = %run_id, "workflow: training running");
                    self.publish(WorkflowEvent::TrainingStatusChanged(TrainingStatus::Running));
                }
            }
            TaskState::Failed(failure) => {
                let message = match &failure {
                    WorkflowFailure::TrainStart(message) => message.clone(),
                    other => other.to_string(),
                };
                let changed = session.lock().await.fail_to_start(message);
                self.release_training().await;
                warn!(run = %run_id, "workflow: {failure}");
                if changed {
                    self.publish(WorkflowEvent::TrainingStatusChanged(TrainingStatus::Failed));
                }
                self.publish(WorkflowEvent::Failure(failure));
            }
            TaskState::Pending | TaskState::Idle => {
                debug!(run = %run_id, "workflow: train call already in flight");
            }
        }
    }

    async fn on_training_signal(&self, run_id: RunId, signal: TrainingSignal) {
        if !self.is_current(run_id).await {
            return;
        }
        self.publish(WorkflowEvent::Training(signal.clone()));
        match signal {
            TrainingSignal::Progress(percent) => {
                debug!(run = %run_id, percent, "workflow: training progress");
            }
            TrainingSignal::Estimated(_) => {}
            TrainingSignal::Completed => {
                info!(run = %run_id, "workflow: training completed");
                self.stop_estimator(run_id).await;
                self.publish(WorkflowEvent::TrainingStatusChanged(TrainingStatus::Completed));
                self.refresh_gate(run_id).await;
            }
            TrainingSignal::Failed(message) => {
                warn!(run = %run_id, "workflow: training failed: {message}");
                self.stop_estimator(run_id).await;
                self.publish(WorkflowEvent::TrainingStatusChanged(TrainingStatus::Failed));
                self.publish(WorkflowEvent::Failure(WorkflowFailure::TrainingFailed(
                    message,
                )));
            }
        }
    }

    async fn stop_estimator(&self, run_id: RunId) {
        let mut active = self.active_training.lock().await;
        if let Some(active) = active.as_mut() {
            if active.run_id == run_id {
                active.estimator.stop().await;
            }
        }
    }

    async fn release_training(&self) {
        let active = self.active_training.lock().await.take();
        if let Some(active) = active {
            active.release().await;
        }
    }

    async fn refresh_gate(&self, run_id: RunId) {
        let Some(mut inner) = self.lock_run(run_id).await else {
            return;
        };
        if inner.gate_open {
            return;
        }
        let status = self.session_handle().await.lock().await.status();
        if can_proceed_to_prediction(status, inner.stages.all_viewed()) {
            inner.gate_open = true;
            drop(inner);
            info!(run = %run_id, "workflow: prediction unlocked");
            self.publish(WorkflowEvent::GateOpened);
        }
    }

    pub async fn next_stage(self: &Arc<Self>) -> Result<usize, WorkflowError> {
        self.move_stage(StageViewer::next).await
    }

    pub async fn previous_stage(self: &Arc<Self>) -> Result<usize, WorkflowError> {
        self.move_stage(StageViewer::previous).await
    }

    async fn move_stage(
        self: &Arc<Self>,
        step: fn(&mut StageViewer) -> bool,
    ) -> Result<usize, WorkflowError> {
        let (run_id, index, all_viewed, moved) = {
            let mut inner = self.inner.lock().await;
            ensure_phase(inner.phase, WorkflowPhase::Training)?;
            let moved = step(&mut inner.stages);
            (
                inner.run_id,
                inner.stages.current(),
                inner.stages.all_viewed(),
                moved,
            )
        };
        if moved {
            debug!(run = %run_id, index, all_viewed, "workflow: stage changed");
            self.publish(WorkflowEvent::StageChanged { index, all_viewed });
            self.refresh_gate(run_id).await;
            self.show_stage_image(run_id, index).await;
        }
        Ok(index)
    }

    /// Replaces whatever stage image fetch is running with one for
    /// `stage_index`. The fetch runs detached; navigation and the gate never
    /// wait on it.
    async fn show_stage_image(self: &Arc<Self>, run_id: RunId, stage_index: usize) {
        let mut task = self.stage_image_task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }
        self.stage_image.reset();
        if !self.is_current(run_id).await {
            return;
        }
        let controller = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            controller.load_stage_image(run_id, stage_index).await;
        }));
    }

    async fn load_stage_image(&self, run_id: RunId, stage_index: usize) {
        let backend = Arc::clone(&self.backend);
        let outcome = self
            .stage_image
            .run(|| async move {
                backend
                    .stage_image(stage_index)
                    .await
                    .map(|artifact| StageImage {
                        stage_index,
                        artifact,
                    })
                    .map_err(|err| WorkflowFailure::StageImage {
                        stage_index,
                        message: err.message,
                    })
            })
            .await;

        if !self.is_current(run_id).await {
            return;
        }
        match outcome {
            TaskState::Succeeded(_) => {
                debug!(run = %run_id, index = stage_index, "workflow: stage image ready");
                self.publish(WorkflowEvent::StageImageReady { index: stage_index });
            }
            TaskState::Failed(failure) => {
                warn!(run = %run_id, "workflow: {failure}");
                self.publish(WorkflowEvent::Failure(failure));
            }
            TaskState::Pending | TaskState::Idle => {}
        }
    }

    async fn release_stage_image(&self) {
        if let Some(task) = self.stage_image_task.lock().await.take() {
            task.abort();
        }
        self.stage_image.reset();
    }

    /// Manual restart after the backend reported a failure or refused to
    /// start training.
    pub async fn retry_training(self: &Arc<Self>) -> Result<(), WorkflowError> {
        let run_id = {
            let inner = self.inner.lock().await;
            ensure_phase(inner.phase, WorkflowPhase::Training)?;
            inner.run_id
        };
        if !self.session_handle().await.lock().await.restart() {
            return Err(WorkflowError::TrainingNotFailed);
        }
        self.release_training().await;
        self.train.reset();
        info!(run = %run_id, "workflow: restarting training");
        self.start_training(run_id).await;
        Ok(())
    }

    /// Leaves the training screen for the prediction screen. Only allowed
    /// once the gate is open.
    pub async fn proceed_to_prediction(&self) -> Result<(), WorkflowError> {
        let run_id = {
            let mut inner = self.inner.lock().await;
            ensure_phase(inner.phase, WorkflowPhase::Training)?;
            let status = self.session_handle().await.lock().await.status();
            if !can_proceed_to_prediction(status, inner.stages.all_viewed()) {
                return Err(WorkflowError::GateClosed);
            }
            inner.phase = WorkflowPhase::Predicting;
            inner.surface.clear();
            inner.run_id
        };
        self.release_training().await;
        self.release_stage_image().await;
        self.predict.reset();
        info!(run = %run_id, "workflow: entered prediction");
        self.publish(WorkflowEvent::PhaseChanged(WorkflowPhase::Predicting));
        Ok(())
    }

    pub async fn request_prediction(
        &self,
    ) -> Result<TaskState<PredictionResult, WorkflowFailure>, WorkflowError> {
        let (run_id, artifact) = {
            let inner = self.inner.lock().await;
            ensure_phase(inner.phase, WorkflowPhase::Predicting)?;
            if self.predict.is_pending() {
                return Err(WorkflowError::Busy("predict"));
            }
            (inner.run_id, inner.surface.export())
        };

        let backend = Arc::clone(&self.backend);
        let catalog = &self.catalog;
        let outcome = self
            .predict
            .run(|| async move {
                let artifact = artifact.map_err(|err| {
                    WorkflowFailure::Predict(format!("failed to encode drawing: {err}"))
                })?;
                let class_index = backend
                    .predict(&artifact)
                    .await
                    .map_err(|err| WorkflowFailure::Predict(err.message))?;
                Ok(PredictionResult {
                    class_index,
                    label: catalog.get(class_index as usize).cloned(),
                    artifact,
                })
            })
            .await;

        if !self.is_current(run_id).await {
            return Ok(outcome);
        }
        match &outcome {
            TaskState::Succeeded(result) => {
                info!(
                    run = %run_id,
                    class = result.class_index,
                    label = ?result.label,
                    "workflow: prediction ready"
                );
                self.publish(WorkflowEvent::PredictionReady(result.clone()));
            }
            TaskState::Failed(failure) => {
                warn!(run = %run_id, "workflow: {failure}");
                self.publish(WorkflowEvent::Failure(failure.clone()));
            }
            TaskState::Pending | TaskState::Idle => return Err(WorkflowError::Busy("predict")),
        }
        Ok(outcome)
    }

    /// Abandons the current run: releases the training subscription and the
    /// estimator, discards collection, training and stage state, and starts a
    /// fresh run at the collection phase.
    pub async fn reset_workflow(&self) -> RunId {
        let run_id = RunId::new();
        let previous = {
            let mut inner = self.inner.lock().await;
            let previous = inner.run_id;
            inner.run_id = run_id;
            inner.phase = WorkflowPhase::Collecting;
            inner.stages.reset();
            inner.surface.clear();
            inner.collection = CollectionProgress {
                current_index: 0,
                total: self.catalog.len(),
                completed: false,
            };
            inner.current_label = self.catalog.get(0).cloned();
            inner.gate_open = false;
            inner.closed = false;
            *self.session.lock().await = TrainingSession::shared();
            *self.collection.lock().await = Arc::new(Mutex::new(SymbolCollectionSequencer::new(
                self.catalog.clone(),
            )));
            previous
        };

        self.release_training().await;
        self.release_stage_image().await;
        self.save.reset();
        self.train.reset();
        self.predict.reset();

        info!(previous = %previous, run = %run_id, "workflow: reset");
        self.publish(WorkflowEvent::PhaseChanged(WorkflowPhase::Collecting));
        run_id
    }

    /// Releases the training subscription and the estimator and drops every
    /// continuation still in flight. The state stays readable; only
    /// [`reset_workflow`](Self::reset_workflow) starts a new run afterwards.
    pub async fn shutdown(&self) {
        let run_id = {
            let mut inner = self.inner.lock().await;
            inner.closed = true;
            inner.run_id
        };
        self.release_training().await;
        self.release_stage_image().await;
        self.save.reset();
        self.train.reset();
        self.predict.reset();
        info!(run = %run_id, "workflow: shut down");
    }
}

struct SignalForwarder {
    controller: Weak<WorkflowController>,
    run_id: RunId,
}

#[async_trait]
impl TrainingSignalSink for SignalForwarder {
    async fn on_signal(&self, signal: TrainingSignal) {
        if let Some(controller) = self.controller.upgrade() {
            controller.on_training_signal(self.run_id, signal).await;
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
