use super::*;

fn viewer(count: usize) -> StageViewer {
    StageViewer::new(
        PipelineStage::default_pipeline()
            .into_iter()
            .cycle()
            .take(count)
            .collect(),
    )
}

#[test]
fn navigation_clamps_at_both_ends() {
    let mut stages = viewer(3);
    assert!(!stages.previous());
    assert_eq!(stages.current(), 0);

    assert!(stages.next());
    assert!(stages.next());
    assert!(!stages.next());
    assert_eq!(stages.current(), 2);
}

#[test]
fn all_viewed_only_at_last_index_and_stays_true() {
    let mut stages = viewer(3);
    assert!(!stages.all_viewed());
    stages.next();
    assert!(!stages.all_viewed());
    stages.next();
    assert!(stages.all_viewed());

    stages.previous();
    stages.previous();
    assert_eq!(stages.current(), 0);
    assert!(stages.all_viewed());
    assert_eq!(stages.cursor().visited_max, 2);

    stages.reset();
    assert!(!stages.all_viewed());
}

#[test]
fn single_stage_is_viewed_immediately() {
    assert!(viewer(1).all_viewed());
}

#[test]
fn gate_requires_both_conditions() {
    use TrainingStatus::*;
    for status in [Idle, Requested, Running, Completed, Failed] {
        assert!(!can_proceed_to_prediction(status, false));
    }
    for status in [Idle, Requested, Running, Failed] {
        assert!(!can_proceed_to_prediction(status, true));
    }
    assert!(can_proceed_to_prediction(Completed, true));
}

#[test]
fn gate_hint_matches_state() {
    assert_eq!(
        GateHint::evaluate(TrainingStatus::Running, true),
        GateHint::TrainingInProgress
    );
    assert_eq!(
        GateHint::evaluate(TrainingStatus::Completed, false),
        GateHint::ViewAllStages
    );
    assert_eq!(
        GateHint::evaluate(TrainingStatus::Completed, true).caption(),
        "Start Predicting"
    );
    assert_eq!(
        GateHint::evaluate(TrainingStatus::Failed, true),
        GateHint::TrainingFailed
    );
}
