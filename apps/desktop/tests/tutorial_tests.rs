use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use client_core::{
    config::{CanvasSettings, EstimatorSettings},
    Settings, TrainingStatus, TutorialBackend, WorkflowController, WorkflowPhase,
};
use desktop::{run_tutorial, LocalBackend, LocalBackendConfig};
use shared::domain::{Label, PipelineStage};

fn temp_root(name: &str) -> PathBuf {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("tutorial_desktop_{name}_{suffix}"))
}

fn settings() -> Settings {
    Settings {
        labels: vec!["0".into(), "1".into(), "2".into()],
        stages: PipelineStage::default_pipeline(),
        canvas: CanvasSettings {
            width: 112,
            height: 112,
            brush_radius: 4.0,
            ..CanvasSettings::default()
        },
        estimator: EstimatorSettings {
            tick_ms: 20,
            seed: Some(7),
            ..EstimatorSettings::default()
        },
    }
}

fn setup(root: &Path, fail_training: bool) -> (Arc<LocalBackend>, Arc<WorkflowController>) {
    let settings = settings();
    let backend = Arc::new(LocalBackend::new(
        LocalBackendConfig {
            data_dir: root.to_path_buf(),
            train_duration: Duration::from_millis(200),
            fail_training,
        },
        settings.label_catalog().expect("catalog"),
    ));
    let dyn_backend: Arc<dyn TutorialBackend> = backend.clone();
    let controller = WorkflowController::new(dyn_backend, settings).expect("controller");
    (backend, controller)
}

#[tokio::test]
async fn tutorial_runs_end_to_end_against_local_backend() {
    let root = temp_root("e2e");
    let (backend, controller) = setup(&root, false);

    let view = run_tutorial(&controller, Duration::from_secs(10))
        .await
        .expect("tutorial");

    assert_eq!(view.phase, WorkflowPhase::Predicting);
    assert!(view.collection_completed);
    let prediction = view.prediction.expect("prediction");
    assert_eq!(prediction.class_index, 0);
    assert_eq!(prediction.label, Some(Label::new("0")));

    for label in ["0", "1", "2"] {
        let path = backend.drawings_dir().join(format!("{label}.png"));
        let sample = image::open(&path).expect("saved sample");
        assert_eq!((sample.width(), sample.height()), (28, 28));
    }

    controller.shutdown().await;
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn failed_training_stops_before_prediction() {
    let root = temp_root("fail");
    let (_backend, controller) = setup(&root, true);

    let err = run_tutorial(&controller, Duration::from_secs(10))
        .await
        .expect_err("training should fail");
    assert!(err.to_string().contains("training diverged"), "{err:#}");

    let view = controller.snapshot().await;
    assert_eq!(view.phase, WorkflowPhase::Training);
    assert_eq!(view.training_status, TrainingStatus::Failed);
    assert!(!view.can_proceed_to_predict);

    controller.shutdown().await;
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn prediction_without_samples_reports_not_found() {
    let root = temp_root("empty");
    let backend = LocalBackend::new(
        LocalBackendConfig {
            data_dir: root.clone(),
            train_duration: Duration::from_millis(10),
            fail_training: false,
        },
        settings().label_catalog().expect("catalog"),
    );
    let artifact = client_core::DrawingSurface::new(CanvasSettings::default())
        .export()
        .expect("export");

    let err = backend.predict(&artifact).await.expect_err("no samples");
    assert_eq!(err.code, shared::error::BackendErrorCode::NotFound);
    assert!(backend.sample_path(&Label::new("a/b")).is_err());
}

#[tokio::test]
async fn stage_images_follow_the_latest_sample() {
    let root = temp_root("stages");
    let backend = LocalBackend::new(
        LocalBackendConfig {
            data_dir: root.clone(),
            train_duration: Duration::from_millis(10),
            fail_training: false,
        },
        settings().label_catalog().expect("catalog"),
    );

    let err = backend.stage_image(0).await.expect_err("nothing saved yet");
    assert_eq!(err.code, shared::error::BackendErrorCode::NotFound);

    let mut surface = client_core::DrawingSurface::new(settings().canvas);
    surface.begin_stroke(client_core::Point::new(20.0, 56.0));
    surface.extend_stroke(client_core::Point::new(92.0, 56.0));
    surface.end_stroke();
    let artifact = surface.export().expect("export");
    backend
        .save_drawing(&artifact, &Label::new("1"))
        .await
        .expect("save");

    for (stage, dimensions) in [(0, (28, 28)), (1, (28, 28)), (2, (14, 14)), (3, (196, 1))] {
        let image = backend.stage_image(stage).await.expect("stage image");
        let bytes = image.decode().expect("base64");
        let decoded = image::load_from_memory(&bytes).expect("png");
        assert_eq!((decoded.width(), decoded.height()), dimensions, "stage {stage}");
    }

    let err = backend.stage_image(4).await.expect_err("no such stage");
    assert_eq!(err.code, shared::error::BackendErrorCode::NotFound);
    let _ = std::fs::remove_dir_all(&root);
}
