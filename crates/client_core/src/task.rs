//! Single-slot tracker for one kind of backend call (save, train, predict).

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum TaskState<T, E> {
    Idle,
    Pending,
    Succeeded(T),
    Failed(E),
}

impl<T, E> TaskState<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Pending)
    }

    pub fn succeeded(&self) -> Option<&T> {
        match self {
            TaskState::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn failed(&self) -> Option<&E> {
        match self {
            TaskState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

pub struct AsyncTaskHandle<T, E> {
    name: &'static str,
    state: watch::Sender<TaskState<T, E>>,
    epoch: AtomicU64,
}

impl<T, E> AsyncTaskHandle<T, E>
where
    T: Clone,
    E: Clone,
{
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(TaskState::Idle);
        Self {
            name,
            state,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> TaskState<T, E> {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState<T, E>> {
        self.state.subscribe()
    }

    /// Runs `op` unless a previous invocation is still pending, in which case
    /// `op` is dropped unstarted and `Pending` is returned.
    ///
    /// The returned state is the outcome of this invocation even when a
    /// concurrent [`reset`](Self::reset) kept it from being stored.
    pub async fn run<F, Fut>(&self, op: F) -> TaskState<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = self.state.send_if_modified(|state| {
            if state.is_pending() {
                false
            } else {
                *state = TaskState::Pending;
                true
            }
        });
        if !started {
            debug!(task = self.name, "task: run ignored, invocation already pending");
            return TaskState::Pending;
        }
        let epoch = self.epoch.load(Ordering::SeqCst);

        let outcome = match op().await {
            Ok(value) => TaskState::Succeeded(value),
            Err(err) => TaskState::Failed(err),
        };

        let stored = self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) == epoch {
                *state = outcome.clone();
                true
            } else {
                false
            }
        });
        if !stored {
            debug!(task = self.name, "task: outcome discarded after reset");
        }
        outcome
    }

    /// Back to `Idle`. An invocation still in flight keeps running but its
    /// outcome is no longer stored.
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(TaskState::Idle);
    }
}

#[cfg(test)]
#[path = "tests/task_tests.rs"]
mod tests;
