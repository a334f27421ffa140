//! Feature extraction: preprocessed audio → ordered numeric feature vector.
//!
//! Every feature family is registered once in a static table
//! ([`registry`]) that maps a [`FeatureFamily`] to its extraction function
//! and its output names. A [`FeatureExtractor`] runs the selected families
//! in registry order, so the layout of a [`FeatureVector`] depends only on
//! the family selection and the frequency bands, never on the audio.
//!
//! | Family | Values |
//! |--------|--------|
//! | `EnvelopeEnergyPeakDetection` | 19 |
//! | `ZeroCrossingRate` | 1 |
//! | `RmsPower` | 1 |
//! | `DominantFrequency` | 1 |
//! | `SpectralShape` | 6 |
//! | `SpectralFlatnessStdDev` | 2 |
//! | `SpectralSlopeDecrease` | 2 |
//! | `Mfcc` | 26 |
//! | `CrestFactor` | 1 |
//! | `SignalLength` | 1 |
//! | `PowerSpectralDensityBands` | one per band |
//! | `StdDev` | 1 |
//! | `PowerRatioEstimation` | 1 |
//!
//! The first eleven form the cough-detection set
//! ([`FeatureFamily::DETECTION`]).
//!
//! # Example
//!
//! ```rust
//! use cough_screen::audio::RawAudio;
//! use cough_screen::features::{extract_features, FeatureExtractor};
//!
//! let tone: Vec<f32> = (0..22_050)
//!     .map(|i| (i as f32 * 0.05).sin() * 0.4)
//!     .collect();
//! let features = extract_features(&RawAudio::mono(tone, 44_100)).unwrap();
//! assert_eq!(features.len(), FeatureExtractor::detection().len());
//! ```

mod cepstral;
pub mod registry;
mod spectral;
mod temporal;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{AudioError, RawAudio, SignalPreprocessor};

pub use registry::{FeatureExtractor, FeatureFamily};

/// Added to every denominator in the feature formulas.
pub(crate) const EPSILON: f64 = 1e-17;

// ---------------------------------------------------------------------------
// ExtractionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    /// One family could not produce finite values; nothing is returned.
    #[error("feature family {family} failed: {reason}")]
    Family { family: FeatureFamily, reason: String },

    /// A frequency band is malformed.
    #[error("invalid frequency band [{low_hz}, {high_hz}]: {reason}")]
    InvalidBand {
        low_hz: f64,
        high_hz: f64,
        reason: String,
    },

    /// The recording could not be preprocessed.
    #[error(transparent)]
    Preprocess(#[from] AudioError),
}

// ---------------------------------------------------------------------------
// FrequencyBand
// ---------------------------------------------------------------------------

/// Closed frequency interval `[low_hz, high_hz]` for band-power features.
///
/// Serialized as a two-element array, `[300.0, 425.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct FrequencyBand {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Finite, non-negative, and `low < high`.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        let reason = if !self.low_hz.is_finite() || !self.high_hz.is_finite() {
            "bounds must be finite"
        } else if self.low_hz < 0.0 {
            "lower bound must be non-negative"
        } else if self.low_hz >= self.high_hz {
            "lower bound must be below upper bound"
        } else {
            return Ok(());
        };
        Err(ExtractionError::InvalidBand {
            low_hz: self.low_hz,
            high_hz: self.high_hz,
            reason: reason.into(),
        })
    }

    pub fn contains(&self, hz: f64) -> bool {
        hz >= self.low_hz && hz <= self.high_hz
    }
}

impl From<(f64, f64)> for FrequencyBand {
    fn from((low_hz, high_hz): (f64, f64)) -> Self {
        Self { low_hz, high_hz }
    }
}

impl From<FrequencyBand> for (f64, f64) {
    fn from(band: FrequencyBand) -> Self {
        (band.low_hz, band.high_hz)
    }
}

/// Band layout the cough-detection model was trained with.
pub const DEFAULT_BANDS: [FrequencyBand; 8] = [
    FrequencyBand::new(0.0, 200.0),
    FrequencyBand::new(300.0, 425.0),
    FrequencyBand::new(500.0, 650.0),
    FrequencyBand::new(950.0, 1150.0),
    FrequencyBand::new(1400.0, 1800.0),
    FrequencyBand::new(2300.0, 2400.0),
    FrequencyBand::new(2850.0, 2950.0),
    FrequencyBand::new(3800.0, 3900.0),
];

// ---------------------------------------------------------------------------
// FeatureVector
// ---------------------------------------------------------------------------

/// Named feature values in extraction order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            names: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, name: String, value: f64) {
        self.names.push(name);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Value of the feature called `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

// ---------------------------------------------------------------------------
// Convenience
// ---------------------------------------------------------------------------

/// Default preprocessing followed by the cough-detection families over
/// [`DEFAULT_BANDS`].
pub fn extract_features(audio: &RawAudio) -> Result<FeatureVector, ExtractionError> {
    let clean = SignalPreprocessor::default().process(audio)?;
    FeatureExtractor::detection().extract(&clean)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_validation() {
        assert!(FrequencyBand::new(0.0, 200.0).validate().is_ok());
        assert!(FrequencyBand::new(200.0, 200.0).validate().is_err());
        assert!(FrequencyBand::new(-1.0, 200.0).validate().is_err());
        assert!(FrequencyBand::new(0.0, f64::NAN).validate().is_err());
        assert!(FrequencyBand::new(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn band_contains_is_inclusive() {
        let band = FrequencyBand::new(300.0, 425.0);
        assert!(band.contains(300.0));
        assert!(band.contains(425.0));
        assert!(!band.contains(425.1));
    }

    #[test]
    fn default_bands_are_valid() {
        assert!(DEFAULT_BANDS.iter().all(|b| b.validate().is_ok()));
    }

    #[test]
    fn feature_vector_lookup() {
        let mut v = FeatureVector::default();
        v.push("rms_power".into(), 0.5);
        v.push("crest_factor".into(), 2.0);
        assert_eq!(v.len(), 2);
        assert_eq!(v.get("crest_factor"), Some(2.0));
        assert_eq!(v.get("missing"), None);
        let pairs: Vec<_> = v.iter().collect();
        assert_eq!(pairs, vec![("rms_power", 0.5), ("crest_factor", 2.0)]);
    }

    #[test]
    fn extract_features_rejects_low_rate() {
        let err = extract_features(&RawAudio::mono(vec![0.1; 8_000], 8_000)).unwrap_err();
        assert!(matches!(err, ExtractionError::Preprocess(AudioError::InvalidSampleRate { .. })));
    }
}
