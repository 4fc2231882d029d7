use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use shared::domain::{LabelCatalog, PipelineStage};

pub const DEFAULT_CONFIG_FILE: &str = "tutorial.toml";
/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIDE: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub width: u32,
    pub height: u32,
    pub brush_radius: f32,
    /// Fill used by `clear()`. Collection and prediction share it so the
    /// model sees one polarity.
    pub background: [u8; 3],
    pub foreground: [u8; 3],
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: 280,
            height: 280,
            brush_radius: 5.0,
            background: [0, 0, 0],
            foreground: [255, 255, 255],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    pub tick_ms: u64,
    pub increment_min: f32,
    pub increment_max: f32,
    pub ceiling: f32,
    pub seed: Option<u64>,
}

impl EstimatorSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            increment_min: 0.05,
            increment_max: 0.15,
            ceiling: 95.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub labels: Vec<String>,
    pub stages: Vec<PipelineStage>,
    pub canvas: CanvasSettings,
    pub estimator: EstimatorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            labels: LabelCatalog::default_symbols()
                .iter()
                .map(|label| label.as_str().to_string())
                .collect(),
            stages: PipelineStage::default_pipeline(),
            canvas: CanvasSettings::default(),
            estimator: EstimatorSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.label_catalog()?;
        if self.stages.is_empty() {
            bail!("at least one pipeline stage must be configured");
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            bail!(
                "canvas must have a non-zero size, got {}x{}",
                self.canvas.width,
                self.canvas.height
            );
        }
        if self.canvas.width > MAX_CANVAS_SIDE || self.canvas.height > MAX_CANVAS_SIDE {
            bail!(
                "canvas may be at most {MAX_CANVAS_SIDE}x{MAX_CANVAS_SIDE}, got {}x{}",
                self.canvas.width,
                self.canvas.height
            );
        }
        if !(self.canvas.brush_radius > 0.0) {
            bail!("brush radius must be positive");
        }
        let est = &self.estimator;
        if est.tick_ms == 0 {
            bail!("estimator tick must be at least 1ms");
        }
        if !(est.ceiling > 0.0 && est.ceiling < 100.0) {
            bail!("estimator ceiling must be inside (0, 100), got {}", est.ceiling);
        }
        if !(est.increment_min > 0.0 && est.increment_min <= est.increment_max) {
            bail!(
                "estimator increments must satisfy 0 < min <= max, got {}..{}",
                est.increment_min,
                est.increment_max
            );
        }
        Ok(())
    }

    pub fn label_catalog(&self) -> anyhow::Result<LabelCatalog> {
        LabelCatalog::new(self.labels.iter().cloned()).context("invalid label catalog")
    }
}

/// Loads `tutorial.toml` from the working directory when present, then
/// applies `APP__*` environment overrides.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut settings, env)?;
    settings.validate()?;
    Ok(settings)
}

fn apply_env_overrides(
    settings: &mut Settings,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = env("APP__LABELS") {
        settings.labels = v
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = env("APP__ESTIMATOR_TICK_MS") {
        settings.estimator.tick_ms = v
            .parse()
            .with_context(|| format!("APP__ESTIMATOR_TICK_MS is not an integer: '{v}'"))?;
    }
    if let Some(v) = env("APP__ESTIMATOR_CEILING") {
        settings.estimator.ceiling = v
            .parse()
            .with_context(|| format!("APP__ESTIMATOR_CEILING is not a number: '{v}'"))?;
    }
    if let Some(v) = env("APP__CANVAS_SIZE") {
        let size: u32 = v
            .parse()
            .with_context(|| format!("APP__CANVAS_SIZE is not an integer: '{v}'"))?;
        settings.canvas.width = size;
        settings.canvas.height = size;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
