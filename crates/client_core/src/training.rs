//! Training session state machine and the bridge that feeds it backend events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::protocol::TrainingEvent;
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Idle,
    Requested,
    Running,
    Completed,
    Failed,
}

impl TrainingStatus {
    pub fn is_active(self) -> bool {
        matches!(self, TrainingStatus::Requested | TrainingStatus::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TrainingStatus::Completed | TrainingStatus::Failed)
    }
}

/// Typed lifecycle signal republished after a session transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", content = "value", rename_all = "snake_case")]
pub enum TrainingSignal {
    Progress(f32),
    Estimated(f32),
    Completed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TrainingSession {
    status: TrainingStatus,
    progress_percent: f32,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    updates: u64,
}

pub type SharedSession = Arc<Mutex<TrainingSession>>;

impl Default for TrainingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingSession {
    pub fn new() -> Self {
        Self {
            status: TrainingStatus::Idle,
            progress_percent: 0.0,
            error_message: None,
            started_at: None,
            finished_at: None,
            updates: 0,
        }
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn status(&self) -> TrainingStatus {
        self.status
    }

    pub fn progress_percent(&self) -> f32 {
        self.progress_percent
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Number of state changes applied so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// `Idle → Requested`. Any other state ignores the request.
    pub fn request(&mut self) -> bool {
        if self.status != TrainingStatus::Idle {
            return false;
        }
        self.status = TrainingStatus::Requested;
        self.progress_percent = 0.0;
        self.error_message = None;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.updates += 1;
        true
    }

    /// The backend accepted the run.
    pub fn mark_running(&mut self) -> bool {
        if self.status != TrainingStatus::Requested {
            return false;
        }
        self.status = TrainingStatus::Running;
        self.updates += 1;
        true
    }

    /// The trigger call itself failed.
    pub fn fail_to_start(&mut self, message: impl Into<String>) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.fail(message.into());
        true
    }

    /// `Failed → Idle`, ready for a manual restart.
    pub fn restart(&mut self) -> bool {
        if self.status != TrainingStatus::Failed {
            return false;
        }
        *self = Self {
            updates: self.updates + 1,
            ..Self::new()
        };
        true
    }

    /// Applies one backend event. Returns the resulting signal, or `None`
    /// when the event was ignored (session not active, terminal already
    /// reached, or progress lower than what is displayed).
    pub fn apply(&mut self, event: &TrainingEvent) -> Option<TrainingSignal> {
        if !self.status.is_active() {
            return None;
        }
        match event {
            TrainingEvent::Progress(value) => {
                if !value.is_finite() {
                    return None;
                }
                let value = value.clamp(0.0, 100.0);
                if value < self.progress_percent {
                    return None;
                }
                self.progress_percent = value;
                self.status = TrainingStatus::Running;
                self.updates += 1;
                Some(TrainingSignal::Progress(value))
            }
            TrainingEvent::Complete => {
                self.status = TrainingStatus::Completed;
                self.progress_percent = 100.0;
                self.finished_at = Some(Utc::now());
                self.updates += 1;
                Some(TrainingSignal::Completed)
            }
            TrainingEvent::Error(message) => {
                self.fail(message.clone());
                Some(TrainingSignal::Failed(message.clone()))
            }
        }
    }

    /// Merges a locally estimated value. Only ever raises the percentage.
    pub fn propose_estimate(&mut self, value: f32) -> bool {
        if !self.status.is_active() || !value.is_finite() {
            return false;
        }
        let value = value.clamp(0.0, 100.0);
        if value <= self.progress_percent {
            return false;
        }
        self.progress_percent = value;
        self.updates += 1;
        true
    }

    fn fail(&mut self, message: String) {
        self.status = TrainingStatus::Failed;
        self.error_message = Some(message);
        self.finished_at = Some(Utc::now());
        self.updates += 1;
    }
}

/// Receives signals produced by the bridge and the estimator.
#[async_trait]
pub trait TrainingSignalSink: Send + Sync {
    async fn on_signal(&self, signal: TrainingSignal);
}

/// Owns the subscription to the backend's training channel for one run.
///
/// The single receiver carries progress, completion and failure, so
/// releasing the bridge unsubscribes from all three at once. Dropping the
/// bridge aborts its task; [`detach`](Self::detach) also waits for it.
pub struct TrainingEventBridge {
    task: Option<JoinHandle<()>>,
}

impl TrainingEventBridge {
    pub fn attach(
        mut events: broadcast::Receiver<TrainingEvent>,
        session: SharedSession,
        sink: Arc<dyn TrainingSignalSink>,
    ) -> Self {
        debug!("training bridge: attached");
        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "training bridge: receiver lagged, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        info!("training bridge: backend channel closed");
                        break;
                    }
                };

                let signal = {
                    let mut session = session.lock().await;
                    session.apply(&event)
                };
                match signal {
                    Some(signal) => {
                        if event.is_terminal() {
                            info!(channel = event.channel(), "training bridge: run settled");
                        }
                        sink.on_signal(signal).await;
                    }
                    None => debug!(?event, "training bridge: event ignored"),
                }
            }
        });
        Self { task: Some(task) }
    }

    pub fn is_attached(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn detach(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            debug!("training bridge: detached");
        }
    }
}

impl Drop for TrainingEventBridge {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/training_tests.rs"]
mod tests;
