//! Static family registry and the extractor that walks it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioError, PreprocessedAudio};
use crate::dsp::DspError;

use super::{cepstral, spectral, temporal};
use super::{ExtractionError, FeatureVector, FrequencyBand, DEFAULT_BANDS};

// ---------------------------------------------------------------------------
// FeatureFamily
// ---------------------------------------------------------------------------

/// Identifier of a feature family. Declaration order is registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureFamily {
    EnvelopeEnergyPeakDetection,
    ZeroCrossingRate,
    RmsPower,
    DominantFrequency,
    SpectralShape,
    SpectralFlatnessStdDev,
    SpectralSlopeDecrease,
    Mfcc,
    CrestFactor,
    SignalLength,
    PowerSpectralDensityBands,
    StdDev,
    PowerRatioEstimation,
}

impl FeatureFamily {
    /// Families consumed by the cough-detection model, in registry order.
    pub const DETECTION: [FeatureFamily; 11] = [
        FeatureFamily::EnvelopeEnergyPeakDetection,
        FeatureFamily::ZeroCrossingRate,
        FeatureFamily::RmsPower,
        FeatureFamily::DominantFrequency,
        FeatureFamily::SpectralShape,
        FeatureFamily::SpectralFlatnessStdDev,
        FeatureFamily::SpectralSlopeDecrease,
        FeatureFamily::Mfcc,
        FeatureFamily::CrestFactor,
        FeatureFamily::SignalLength,
        FeatureFamily::PowerSpectralDensityBands,
    ];

    fn entry(self) -> &'static FamilyEntry {
        // REGISTRY is indexed by declaration order.
        &REGISTRY[self as usize]
    }

    /// Number of values this family emits for the given bands.
    pub fn arity(self, bands: &[FrequencyBand]) -> usize {
        match self.entry().arity {
            Arity::Fixed(n) => n,
            Arity::PerBand => bands.len(),
        }
    }

    /// Output names, in emission order.
    pub fn names(self, bands: &[FrequencyBand]) -> Vec<String> {
        match self.entry().names {
            Names::Fixed(list) => list.iter().map(|s| s.to_string()).collect(),
            Names::Generated(make) => make(),
            Names::PerBand => spectral::band_names(bands),
        }
    }
}

impl fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// What a family function sees.
pub(crate) struct Signal<'a> {
    pub samples: &'a [f64],
    pub sample_rate: f64,
    pub bands: &'a [FrequencyBand],
}

#[derive(Debug, Clone, Copy)]
enum Arity {
    Fixed(usize),
    PerBand,
}

enum Names {
    Fixed(&'static [&'static str]),
    Generated(fn() -> Vec<String>),
    PerBand,
}

struct FamilyEntry {
    family: FeatureFamily,
    arity: Arity,
    names: Names,
    extract: fn(&Signal<'_>) -> Result<Vec<f64>, DspError>,
}

static REGISTRY: [FamilyEntry; 13] = [
    FamilyEntry {
        family: FeatureFamily::EnvelopeEnergyPeakDetection,
        arity: Arity::Fixed(temporal::EEPD_BANDS),
        names: Names::Generated(temporal::eepd_names),
        extract: temporal::envelope_energy_peaks,
    },
    FamilyEntry {
        family: FeatureFamily::ZeroCrossingRate,
        arity: Arity::Fixed(1),
        names: Names::Fixed(&["zero_crossing_rate"]),
        extract: temporal::zero_crossing_rate,
    },
    FamilyEntry {
        family: FeatureFamily::RmsPower,
        arity: Arity::Fixed(1),
        names: Names::Fixed(&["rms_power"]),
        extract: temporal::rms_power,
    },
    FamilyEntry {
        family: FeatureFamily::DominantFrequency,
        arity: Arity::Fixed(1),
        names: Names::Fixed(&["dominant_freq"]),
        extract: spectral::dominant_frequency,
    },
    FamilyEntry {
        family: FeatureFamily::SpectralShape,
        arity: Arity::Fixed(6),
        names: Names::Fixed(&[
            "spectral_centroid",
            "spectral_rolloff",
            "spectral_spread",
            "spectral_skewness",
            "spectral_kurtosis",
            "spectral_bandwidth",
        ]),
        extract: spectral::spectral_shape,
    },
    FamilyEntry {
        family: FeatureFamily::SpectralFlatnessStdDev,
        arity: Arity::Fixed(2),
        names: Names::Fixed(&["spectral_flatness", "spectral_stdev"]),
        extract: spectral::flatness_and_spread,
    },
    FamilyEntry {
        family: FeatureFamily::SpectralSlopeDecrease,
        arity: Arity::Fixed(2),
        names: Names::Fixed(&["spectral_slope", "spectral_decrease"]),
        extract: spectral::slope_and_decrease,
    },
    FamilyEntry {
        family: FeatureFamily::Mfcc,
        arity: Arity::Fixed(2 * cepstral::N_MFCC),
        names: Names::Generated(cepstral::mfcc_names),
        extract: cepstral::mfcc_summary,
    },
    FamilyEntry {
        family: FeatureFamily::CrestFactor,
        arity: Arity::Fixed(1),
        names: Names::Fixed(&["crest_factor"]),
        extract: temporal::crest_factor,
    },
    FamilyEntry {
        family: FeatureFamily::SignalLength,
        arity: Arity::Fixed(1),
        names: Names::Fixed(&["cough_length"]),
        extract: temporal::signal_length,
    },
    FamilyEntry {
        family: FeatureFamily::PowerSpectralDensityBands,
        arity: Arity::PerBand,
        names: Names::PerBand,
        extract: spectral::band_powers,
    },
    FamilyEntry {
        family: FeatureFamily::StdDev,
        arity: Arity::Fixed(1),
        names: Names::Fixed(&["std_dev"]),
        extract: temporal::std_dev,
    },
    FamilyEntry {
        family: FeatureFamily::PowerRatioEstimation,
        arity: Arity::Fixed(1),
        names: Names::Fixed(&["power_ratio_est"]),
        extract: spectral::power_ratio,
    },
];

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Runs a fixed selection of families over preprocessed audio.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    bands: Vec<FrequencyBand>,
    families: Vec<FeatureFamily>,
}

impl FeatureExtractor {
    /// Validates `bands`; `families` are reordered into registry order and
    /// deduplicated.
    pub fn new(
        bands: Vec<FrequencyBand>,
        families: &[FeatureFamily],
    ) -> Result<Self, ExtractionError> {
        for band in &bands {
            band.validate()?;
        }
        let mut families = families.to_vec();
        families.sort();
        families.dedup();
        Ok(Self { bands, families })
    }

    /// Cough-detection families over the default bands.
    pub fn detection() -> Self {
        Self {
            bands: DEFAULT_BANDS.to_vec(),
            families: FeatureFamily::DETECTION.to_vec(),
        }
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn families(&self) -> &[FeatureFamily] {
        &self.families
    }

    /// Total number of values per vector.
    pub fn len(&self) -> usize {
        self.families.iter().map(|f| f.arity(&self.bands)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of every value, in vector order.
    pub fn feature_names(&self) -> Vec<String> {
        self.families
            .iter()
            .flat_map(|f| f.names(&self.bands))
            .collect()
    }

    pub fn extract(&self, audio: &PreprocessedAudio) -> Result<FeatureVector, ExtractionError> {
        self.extract_samples(&audio.to_f64(), audio.sample_rate)
    }

    /// Extract from raw `f64` samples at `sample_rate` Hz.
    ///
    /// The first failing family aborts the whole call.
    pub fn extract_samples(
        &self,
        samples: &[f64],
        sample_rate: u32,
    ) -> Result<FeatureVector, ExtractionError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidInput("sample rate must be positive".into()).into());
        }
        if samples.is_empty() {
            return Err(AudioError::InvalidInput(DspError::Empty.to_string()).into());
        }
        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(
                AudioError::InvalidInput(format!("non-finite input sample at index {i}")).into(),
            );
        }
        let signal = Signal {
            samples,
            sample_rate: sample_rate as f64,
            bands: &self.bands,
        };

        let mut out = FeatureVector::with_capacity(self.len());
        for &family in &self.families {
            let entry = family.entry();
            debug_assert_eq!(entry.family, family);
            let fail = |reason: String| ExtractionError::Family { family, reason };

            let values = (entry.extract)(&signal).map_err(|e| fail(e.to_string()))?;
            let names = family.names(&self.bands);
            if values.len() != names.len() {
                return Err(fail(format!(
                    "produced {} values for {} names",
                    values.len(),
                    names.len()
                )));
            }
            for (name, value) in names.into_iter().zip(values) {
                if !value.is_finite() {
                    return Err(fail(format!("{name} is not finite ({value})")));
                }
                out.push(name, value);
            }
        }

        log::debug!(
            "extracted {} features from {} samples @ {sample_rate} Hz",
            out.len(),
            samples.len()
        );
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
