use async_trait::async_trait;
use shared::protocol::TrainingEvent;
use tokio::sync::Mutex;

use super::*;
use crate::training::TrainingSession;

struct CountingSink {
    estimates: Mutex<Vec<f32>>,
}

#[async_trait]
impl TrainingSignalSink for CountingSink {
    async fn on_signal(&self, signal: TrainingSignal) {
        if let TrainingSignal::Estimated(value) = signal {
            self.estimates.lock().await.push(value);
        }
    }
}

fn seeded(ceiling: f32) -> ProgressEstimator {
    ProgressEstimator::from_settings(&EstimatorSettings {
        tick_ms: 100,
        increment_min: 0.05,
        increment_max: 0.15,
        ceiling,
        seed: Some(1),
    })
}

#[test]
fn proposals_increase_within_bounds_and_respect_ceiling() {
    let mut estimator = seeded(95.0);
    let mut current = 0.0;
    for _ in 0..50 {
        let next = estimator.propose(current);
        let step = next - current;
        assert!((0.05 - 1e-4..=0.15 + 1e-4).contains(&step), "step {step}");
        current = next;
    }

    assert_eq!(estimator.propose(94.99), 95.0);
    assert_eq!(estimator.propose(95.0), 95.0);
    assert_eq!(estimator.propose(97.0), 97.0);
}

#[test]
fn same_seed_gives_same_sequence() {
    let mut a = seeded(95.0);
    let mut b = seeded(95.0);
    for _ in 0..10 {
        assert_eq!(a.propose(10.0), b.propose(10.0));
    }
}

#[tokio::test(start_paused = true)]
async fn ticks_while_active_and_stops_after_completion() {
    let session = TrainingSession::shared();
    session.lock().await.request();
    let sink = Arc::new(CountingSink {
        estimates: Mutex::new(Vec::new()),
    });

    let task = EstimatorTask::spawn(seeded(95.0), Arc::clone(&session), sink.clone());
    tokio::time::sleep(Duration::from_millis(1_050)).await;

    let ticks = sink.estimates.lock().await.len();
    assert!(ticks >= 9, "expected ~10 ticks, got {ticks}");
    let percent = session.lock().await.progress_percent();
    assert!(percent > 0.0 && percent < 95.0);

    session.lock().await.apply(&TrainingEvent::Complete);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!task.is_running());
    assert_eq!(session.lock().await.progress_percent(), 100.0);
    let after = sink.estimates.lock().await.len();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.estimates.lock().await.len(), after);
}

#[tokio::test(start_paused = true)]
async fn never_claims_completion_on_its_own() {
    let session = TrainingSession::shared();
    session.lock().await.request();
    let sink = Arc::new(CountingSink {
        estimates: Mutex::new(Vec::new()),
    });
    let mut estimator = seeded(95.0);
    estimator.increment_min = 10.0;
    estimator.increment_max = 20.0;

    let mut task = EstimatorTask::spawn(estimator, Arc::clone(&session), sink);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let guard = session.lock().await;
    assert_eq!(guard.progress_percent(), 95.0);
    assert!(guard.is_active());
    drop(guard);

    assert!(task.is_running());
    task.stop().await;
    assert!(!task.is_running());
}
