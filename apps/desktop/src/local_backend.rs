//! Filesystem backend for running the tutorial without a model server.
//!
//! Samples are stored as 28x28 grayscale PNGs named after their label.
//! Training is simulated: a background job emits notifications on the three
//! named training channels. Prediction picks the stored sample closest to the
//! query drawing. Stage images run the most recently saved sample through
//! a toy version of each pipeline stage.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use client_core::{DrawingArtifact, TutorialBackend};
use image::{
    imageops::{self, FilterType},
    GrayImage, ImageFormat, Luma,
};
use serde_json::{json, Value};
use shared::{
    domain::{Label, LabelCatalog},
    error::{BackendError, BackendErrorCode},
    protocol::{
        TrainingEvent, TRAINING_COMPLETE_CHANNEL, TRAINING_ERROR_CHANNEL,
        TRAINING_PROGRESS_CHANNEL,
    },
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

const SAMPLE_SIDE: u32 = 28;
const PROGRESS_MARKS: [f64; 3] = [25.0, 50.0, 75.0];
/// Laplacian edge detector used for the convolution stage.
const EDGE_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

#[derive(Debug, Clone)]
pub struct LocalBackendConfig {
    pub data_dir: PathBuf,
    pub train_duration: Duration,
    pub fail_training: bool,
}

pub struct LocalBackend {
    drawings_dir: PathBuf,
    catalog: LabelCatalog,
    train_duration: Duration,
    fail_training: bool,
    events: broadcast::Sender<TrainingEvent>,
    job: Mutex<Option<JoinHandle<()>>>,
}

impl LocalBackend {
    pub fn new(config: LocalBackendConfig, catalog: LabelCatalog) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            drawings_dir: config.data_dir.join("drawings"),
            catalog,
            train_duration: config.train_duration,
            fail_training: config.fail_training,
            events,
            job: Mutex::new(None),
        }
    }

    pub fn drawings_dir(&self) -> &Path {
        &self.drawings_dir
    }

    pub fn sample_path(&self, label: &Label) -> Result<PathBuf, BackendError> {
        let name = label.as_str();
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(BackendError::invalid_artifact(format!(
                "label '{name}' cannot be used as a file name"
            )));
        }
        Ok(self.drawings_dir.join(format!("{name}.png")))
    }

    fn sample_paths(&self) -> Vec<PathBuf> {
        self.catalog
            .iter()
            .filter_map(|label| self.sample_path(label).ok())
            .collect()
    }

    fn missing_samples(&self) -> Vec<&Label> {
        self.catalog
            .iter()
            .filter(|label| {
                self.sample_path(label)
                    .map(|path| !path.is_file())
                    .unwrap_or(true)
            })
            .collect()
    }
}

fn decode_sample(artifact: &DrawingArtifact) -> Result<GrayImage, BackendError> {
    let bytes = artifact
        .decode()
        .map_err(|err| BackendError::invalid_artifact(format!("artifact is not base64: {err}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|err| BackendError::invalid_artifact(format!("artifact is not an image: {err}")))?;
    Ok(image
        .resize_exact(SAMPLE_SIDE, SAMPLE_SIDE, FilterType::Nearest)
        .to_luma8())
}

fn encode_sample(sample: &GrayImage) -> Result<DrawingArtifact, BackendError> {
    let mut bytes = Vec::new();
    sample
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| BackendError::internal(format!("failed to encode stage image: {err}")))?;
    Ok(DrawingArtifact::from_base64(STANDARD.encode(bytes)))
}

fn latest_sample(paths: Vec<PathBuf>) -> Result<GrayImage, BackendError> {
    let newest = paths
        .into_iter()
        .filter_map(|path| {
            let modified = std::fs::metadata(&path).and_then(|meta| meta.modified()).ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
        .ok_or_else(|| {
            BackendError::new(BackendErrorCode::NotFound, "no saved drawings to visualize")
        })?;
    image::open(&newest)
        .map(|sample| sample.to_luma8())
        .map_err(|err| BackendError::internal(format!("failed to read '{}': {err}", newest.display())))
}

/// 2x2 max pooling.
fn max_pool(sample: &GrayImage) -> GrayImage {
    let (width, height) = sample.dimensions();
    GrayImage::from_fn((width / 2).max(1), (height / 2).max(1), |x, y| {
        let mut value = 0;
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let sx = (2 * x + dx).min(width - 1);
            let sy = (2 * y + dy).min(height - 1);
            value = value.max(sample.get_pixel(sx, sy).0[0]);
        }
        Luma([value])
    })
}

/// Pooled features laid out as the single row a dense layer consumes.
fn flatten(sample: &GrayImage) -> GrayImage {
    let pooled = max_pool(&imageops::filter3x3(sample, &EDGE_KERNEL));
    let values: Vec<u8> = pooled.pixels().map(|pixel| pixel.0[0]).collect();
    GrayImage::from_fn(values.len() as u32, 1, |x, _| Luma([values[x as usize]]))
}

fn render_stage(stage_index: usize, sample: &GrayImage) -> Result<GrayImage, BackendError> {
    match stage_index {
        0 => Ok(sample.clone()),
        1 => Ok(imageops::filter3x3(sample, &EDGE_KERNEL)),
        2 => Ok(max_pool(&imageops::filter3x3(sample, &EDGE_KERNEL))),
        3 => Ok(flatten(sample)),
        _ => Err(BackendError::new(
            BackendErrorCode::NotFound,
            format!("no visualization for stage {stage_index}"),
        )),
    }
}

fn distance(a: &GrayImage, b: &GrayImage) -> u64 {
    a.pixels()
        .zip(b.pixels())
        .map(|(left, right)| u64::from(left.0[0].abs_diff(right.0[0])))
        .sum()
}

fn publish(events: &broadcast::Sender<TrainingEvent>, channel: &str, payload: Value) {
    match TrainingEvent::from_channel(channel, &payload) {
        Some(event) => {
            debug!(channel, ?event, "local backend: training notification");
            let _ = events.send(event);
        }
        None => warn!(channel, %payload, "local backend: malformed training notification dropped"),
    }
}

async fn simulate_training(
    events: broadcast::Sender<TrainingEvent>,
    duration: Duration,
    outcome: Result<(), String>,
) {
    let pause = duration / (PROGRESS_MARKS.len() as u32 + 1);
    for percent in PROGRESS_MARKS {
        tokio::time::sleep(pause).await;
        publish(&events, TRAINING_PROGRESS_CHANNEL, json!(percent));
    }
    tokio::time::sleep(pause).await;
    match outcome {
        Ok(()) => {
            info!("local backend: training finished");
            publish(&events, TRAINING_COMPLETE_CHANNEL, Value::Null);
        }
        Err(message) => {
            warn!("local backend: training failed: {message}");
            publish(&events, TRAINING_ERROR_CHANNEL, json!(message));
        }
    }
}

#[async_trait]
impl TutorialBackend for LocalBackend {
    async fn save_drawing(
        &self,
        artifact: &DrawingArtifact,
        label: &Label,
    ) -> Result<(), BackendError> {
        let sample = decode_sample(artifact)?;
        let path = self.sample_path(label)?;
        let dir = self.drawings_dir.clone();

        tokio::task::spawn_blocking(move || -> Result<(), BackendError> {
            std::fs::create_dir_all(&dir)?;
            sample
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|err| {
                    BackendError::internal(format!("failed to write '{}': {err}", path.display()))
                })
        })
        .await
        .map_err(|err| BackendError::internal(format!("save task failed: {err}")))??;

        info!(label = %label, "local backend: drawing saved");
        Ok(())
    }

    async fn train(&self) -> Result<(), BackendError> {
        let mut job = self.job.lock().await;
        if job.as_ref().is_some_and(|job| !job.is_finished()) {
            return Err(BackendError::unavailable("a training run is already in progress"));
        }

        let missing = self.missing_samples();
        let outcome = if self.fail_training {
            Err("training diverged".to_string())
        } else if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|label| label.as_str()).collect();
            Err(format!("no drawing saved for: {}", names.join(", ")))
        } else {
            Ok(())
        };

        info!(
            samples = self.catalog.len() - missing.len(),
            duration_ms = self.train_duration.as_millis() as u64,
            "local backend: training started"
        );
        *job = Some(tokio::spawn(simulate_training(
            self.events.clone(),
            self.train_duration,
            outcome,
        )));
        Ok(())
    }

    async fn predict(&self, artifact: &DrawingArtifact) -> Result<u32, BackendError> {
        let query = decode_sample(artifact)?;

        let mut best: Option<(usize, u64)> = None;
        for (index, label) in self.catalog.iter().enumerate() {
            let Ok(path) = self.sample_path(label) else {
                continue;
            };
            let template = match image::open(&path) {
                Ok(template) => template.to_luma8(),
                Err(err) => {
                    debug!(label = %label, "local backend: no usable sample: {err}");
                    continue;
                }
            };
            let score = distance(&query, &template);
            if best.map_or(true, |(_, best_score)| score < best_score) {
                best = Some((index, score));
            }
        }

        let (index, score) = best.ok_or_else(|| {
            BackendError::new(
                BackendErrorCode::NotFound,
                "no saved drawings to compare against",
            )
        })?;
        debug!(index, score, "local backend: nearest sample");
        u32::try_from(index).map_err(|_| BackendError::internal("class index out of range"))
    }

    async fn stage_image(&self, stage_index: usize) -> Result<DrawingArtifact, BackendError> {
        let paths = self.sample_paths();
        let stage = tokio::task::spawn_blocking(move || -> Result<GrayImage, BackendError> {
            render_stage(stage_index, &latest_sample(paths)?)
        })
        .await
        .map_err(|err| BackendError::internal(format!("stage image task failed: {err}")))??;

        debug!(
            stage = stage_index,
            width = stage.width(),
            height = stage.height(),
            "local backend: stage image rendered"
        );
        encode_sample(&stage)
    }

    fn subscribe_training_events(&self) -> broadcast::Receiver<TrainingEvent> {
        self.events.subscribe()
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        if let Some(job) = self.job.get_mut().take() {
            job.abort();
        }
    }
}
