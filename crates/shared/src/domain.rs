use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one workflow run. Minted on every reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One class the user is asked to draw.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("label catalog must not be empty")]
    Empty,
    #[error("label '{0}' appears more than once")]
    Duplicate(String),
    #[error("label must not be blank")]
    Blank,
}

/// Fixed, ordered, deduplicated list of labels known at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCatalog {
    labels: Vec<Label>,
}

impl LabelCatalog {
    pub fn new<I, S>(labels: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for raw in labels {
            let raw = raw.into();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(CatalogError::Blank);
            }
            if !seen.insert(trimmed.to_string()) {
                return Err(CatalogError::Duplicate(trimmed.to_string()));
            }
            out.push(Label::new(trimmed));
        }
        if out.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { labels: out })
    }

    /// Digits, then the arithmetic symbols the tutorial collects.
    pub fn default_symbols() -> Self {
        Self {
            labels: [
                "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "+", "-", "×", "÷", "=",
            ]
            .into_iter()
            .map(Label::new)
            .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}

/// One explanatory step of the model pipeline shown while training runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

impl PipelineStage {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
        }
    }

    pub fn default_pipeline() -> Vec<Self> {
        vec![
            Self::new(
                "Input Layer",
                "The drawing is scaled to 28x28 grayscale pixels and fed to the network.",
            ),
            Self::new(
                "Convolutional Layer",
                "Small filters slide over the image and respond to edges and strokes.",
            ),
            Self::new(
                "Pooling Layer",
                "Feature maps are downsampled, keeping the strongest responses.",
            ),
            Self::new(
                "Fully Connected Layer",
                "Pooled features are combined into one score per class.",
            ),
        ]
    }
}
