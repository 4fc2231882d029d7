//! Simulated progress shown while authoritative progress is sparse.

use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

use crate::{
    config::EstimatorSettings,
    training::{SharedSession, TrainingSignal, TrainingSignalSink},
};

pub struct ProgressEstimator {
    rng: StdRng,
    increment_min: f32,
    increment_max: f32,
    ceiling: f32,
    tick: Duration,
}

impl ProgressEstimator {
    pub fn from_settings(settings: &EstimatorSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            increment_min: settings.increment_min,
            increment_max: settings.increment_max.max(settings.increment_min),
            ceiling: settings.ceiling.min(99.9),
            tick: settings.tick_interval(),
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    /// Next displayed value after `current`, never above the ceiling.
    pub fn propose(&mut self, current: f32) -> f32 {
        if current >= self.ceiling {
            return current;
        }
        let step = self
            .rng
            .random_range(self.increment_min..=self.increment_max);
        (current + step).min(self.ceiling)
    }
}

/// Ticking task that feeds estimates into a session while it is active.
///
/// The task exits on the first tick that finds the session outside
/// `Requested`/`Running`; [`stop`](Self::stop) ends it immediately.
pub struct EstimatorTask {
    task: Option<JoinHandle<()>>,
}

impl EstimatorTask {
    pub fn spawn(
        mut estimator: ProgressEstimator,
        session: SharedSession,
        sink: Arc<dyn TrainingSignalSink>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(estimator.tick_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            debug!(ceiling = estimator.ceiling(), "estimator: started");

            loop {
                ticker.tick().await;
                let estimate = {
                    let mut session = session.lock().await;
                    if !session.is_active() {
                        break;
                    }
                    let proposal = estimator.propose(session.progress_percent());
                    session
                        .propose_estimate(proposal)
                        .then(|| session.progress_percent())
                };
                if let Some(value) = estimate {
                    sink.on_signal(TrainingSignal::Estimated(value)).await;
                }
            }
            debug!("estimator: session left running state, stopped");
        });
        Self { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            debug!("estimator: stopped");
        }
    }
}

impl Drop for EstimatorTask {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/estimator_tests.rs"]
mod tests;
