//! Built-in scalers and artifact path resolution.
//!
//! [`StandardScaler`] reads the per-feature mean and scale fitted at
//! training time from a JSON artifact:
//!
//! ```json
//! { "mean": [0.1, 12.0], "scale": [0.05, 3.5] }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::AppPaths;

use super::context::{FeatureMatrix, FeatureScaler, ModelError};

// ---------------------------------------------------------------------------
// IdentityScaler
// ---------------------------------------------------------------------------

/// Passes features through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScaler;

impl FeatureScaler for IdentityScaler {
    fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
        Ok(features.clone())
    }
}

// ---------------------------------------------------------------------------
// StandardScaler
// ---------------------------------------------------------------------------

/// `(x - mean) / scale`, column by column. A zero scale is treated as `1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != scale.len() {
            return Err(ModelError::Artifact(format!(
                "scaler has {} means but {} scales",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err(ModelError::Artifact("scaler parameters must be finite".into()));
        }
        Ok(Self { mean, scale })
    }

    /// Load a scaler from a JSON artifact.
    ///
    /// # Errors
    ///
    /// [`ModelError::Artifact`] when the file is missing, unreadable or
    /// malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::Artifact(format!(
                "scaler not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Artifact(format!("{}: {e}", path.display())))?;
        let raw: StandardScaler = serde_json::from_str(&text)
            .map_err(|e| ModelError::Artifact(format!("{}: {e}", path.display())))?;
        let scaler = Self::new(raw.mean, raw.scale)?;
        log::info!(
            "loaded scaler with {} features from {}",
            scaler.len(),
            path.display()
        );
        Ok(scaler)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ModelError::Artifact(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| ModelError::Artifact(format!("{}: {e}", path.display())))
    }

    /// Number of features the scaler was fitted on.
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
        if features.cols() != self.len() {
            return Err(ModelError::Inference(format!(
                "scaler expects {} features, got {}",
                self.len(),
                features.cols()
            )));
        }
        let data = features
            .as_slice()
            .chunks(features.cols().max(1))
            .flat_map(|row| {
                row.iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (m, s))| (x - m) / if *s == 0.0 { 1.0 } else { *s })
            })
            .collect();
        FeatureMatrix::new(features.rows(), features.cols(), data)
    }
}

// ---------------------------------------------------------------------------
// ArtifactPaths
// ---------------------------------------------------------------------------

/// On-disk locations of the model artifacts under the application's data
/// directory.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub models_dir: PathBuf,
}

impl ArtifactPaths {
    const DETECTION_SCALER: &'static str = "cough_classification_scaler.json";

    pub fn from_app_paths(app_paths: &AppPaths) -> Self {
        Self {
            models_dir: app_paths.models_dir.clone(),
        }
    }

    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Scaler fitted for the cough-detection feature set.
    pub fn detection_scaler(&self) -> PathBuf {
        self.models_dir.join(Self::DETECTION_SCALER)
    }

    pub fn has_detection_scaler(&self) -> bool {
        self.detection_scaler().exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
