//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Missing sections or keys fall back to their defaults.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::audio::{PreprocessConfig, SegmentationParams};
use crate::features::{FrequencyBand, DEFAULT_BANDS};

use super::AppPaths;

// ---------------------------------------------------------------------------
// FeatureConfig
// ---------------------------------------------------------------------------

/// Frequency bands used by the band-power features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub bands: Vec<FrequencyBand>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            bands: DEFAULT_BANDS.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// DetectionConfig
// ---------------------------------------------------------------------------

/// Verdict banding and memoization for the cough-detection pipeline.
///
/// | Confidence | Verdict |
/// |------------|---------|
/// | `< no_cough_below` | no cough |
/// | `[no_cough_below, accept_at)` | weak, ask for a retry |
/// | `>= accept_at` | accepted |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub no_cough_below: f64,
    pub accept_at: f64,
    /// Memoized classifications kept in memory; `0` disables the cache.
    pub cache_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            no_cough_below: 0.20,
            accept_at: 0.55,
            cache_capacity: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Worker pool and admission limits for the classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Concurrent classifications; `None` means available parallelism.
    pub workers: Option<usize>,
    /// Per-request deadline in milliseconds.
    pub timeout_ms: u64,
    /// Shortest recording accepted, in seconds.
    pub min_recording_secs: f32,
    /// Longest recording accepted, in seconds.
    pub max_recording_secs: f32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: None,
            timeout_ms: 10_000,
            min_recording_secs: 0.5,
            max_recording_secs: 10.0,
        }
    }
}

impl ServiceConfig {
    /// Resolved worker count (at least one).
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

// ---------------------------------------------------------------------------
// RiskConfig
// ---------------------------------------------------------------------------

/// Settings for the Covid risk classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Population-mean embedding used when the embedding source fails.
    pub embedding_fallback: f64,
    /// Sample rate the spectral-bandwidth feature is computed at.
    pub bandwidth_reference_rate: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            embedding_fallback: 0.632_990_06,
            bandwidth_reference_rate: 22_050,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use cough_screen::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub preprocess: PreprocessConfig,
    pub segmentation: SegmentationParams,
    pub features: FeatureConfig,
    pub detection: DetectionConfig,
    pub service: ServiceConfig,
    pub risk: RiskConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        log::debug!("loaded settings from {}", path.display());
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.preprocess.cutoff_hz > 0, "preprocess.cutoff_hz must be positive");
        self.segmentation.validate()?;
        for band in &self.features.bands {
            band.validate()?;
        }
        let d = &self.detection;
        ensure!(
            (0.0..=1.0).contains(&d.no_cough_below)
                && (0.0..=1.0).contains(&d.accept_at)
                && d.no_cough_below <= d.accept_at,
            "detection thresholds must satisfy 0 <= no_cough_below <= accept_at <= 1"
        );
        let s = &self.service;
        ensure!(s.timeout_ms > 0, "service.timeout_ms must be positive");
        ensure!(
            s.min_recording_secs >= 0.0 && s.min_recording_secs <= s.max_recording_secs,
            "service recording limits must satisfy 0 <= min <= max"
        );
        ensure!(
            self.risk.embedding_fallback.is_finite(),
            "risk.embedding_fallback must be finite"
        );
        ensure!(
            self.risk.bandwidth_reference_rate > 0,
            "risk.bandwidth_reference_rate must be positive"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
