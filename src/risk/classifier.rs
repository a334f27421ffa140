//! Three-way Covid risk assessment.
//!
//! The model input row is laid out as:
//!
//! ```text
//! [ embedding | duration onsets period rms_max rms_median rms_p25 rms_skew bandwidth | age resp fever ]
//!      1                                8                                               3
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::RawAudio;
use crate::config::RiskConfig;
use crate::model::{FeatureMatrix, ModelError, ModelSlot};

use super::audio::{RiskAudioFeatures, AUDIO_FEATURE_COUNT};
use super::clinical::{ClinicalProfile, CLINICAL_FEATURE_COUNT};
use super::RiskError;

/// Width of the model input row.
pub const RISK_FEATURE_COUNT: usize = 1 + AUDIO_FEATURE_COUNT + CLINICAL_FEATURE_COUNT;

// ---------------------------------------------------------------------------
// EmbeddingSource
// ---------------------------------------------------------------------------

/// Supplies the learned audio-embedding coefficient used by the risk model.
///
/// Implementations typically call a remote embedding service and handle any
/// resampling or clipping of the recording themselves.
pub trait EmbeddingSource: Send + Sync {
    fn embedding(&self, samples: &[f64], sample_rate: u32) -> Result<f64, RiskError>;
}

// Compile-time assertion: EmbeddingSource must be usable as a trait object.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn EmbeddingSource>) {}
};

/// Source that is never reachable; every assessment uses the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbedding;

impl EmbeddingSource for NoEmbedding {
    fn embedding(&self, _samples: &[f64], _sample_rate: u32) -> Result<f64, RiskError> {
        Err(RiskError::Embedding("no embedding source configured".into()))
    }
}

// ---------------------------------------------------------------------------
// RiskLevel / RiskAssessment
// ---------------------------------------------------------------------------

/// Model classes, in probability-column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Healthy,
    Symptomatic,
    Covid,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Healthy, RiskLevel::Symptomatic, RiskLevel::Covid];

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Healthy => "Not likely Covid-19",
            RiskLevel::Symptomatic => "Symptomatic, not Covid-19 like",
            RiskLevel::Covid => "At risk for Covid-19",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Class probabilities indexed like [`RiskLevel::ALL`].
    pub probabilities: [f64; 3],
    pub level: RiskLevel,
    /// `true` when the embedding source failed and the population mean was used.
    pub used_fallback_embedding: bool,
}

// ---------------------------------------------------------------------------
// CovidRiskClassifier
// ---------------------------------------------------------------------------

/// Combines audio, embedding and clinical features and asks the risk model.
pub struct CovidRiskClassifier {
    model: Arc<ModelSlot>,
    embeddings: Arc<dyn EmbeddingSource>,
    config: RiskConfig,
}

impl std::fmt::Debug for CovidRiskClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CovidRiskClassifier")
            .field("model", &self.model)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CovidRiskClassifier {
    pub fn new(
        model: Arc<ModelSlot>,
        embeddings: Arc<dyn EmbeddingSource>,
        config: RiskConfig,
    ) -> Self {
        Self {
            model,
            embeddings,
            config,
        }
    }

    /// Build the full model input row for `audio`.
    ///
    /// Returns the row and whether the fallback embedding was used.
    pub fn feature_row(
        &self,
        audio: &RawAudio,
        clinical: &ClinicalProfile,
    ) -> Result<(Vec<f64>, bool), RiskError> {
        audio.validate()?;
        let samples = audio.to_mono();
        let handcrafted = RiskAudioFeatures::extract(
            &samples,
            audio.sample_rate,
            self.config.bandwidth_reference_rate,
        )?;

        let (embedding, used_fallback) = match self.embeddings.embedding(&samples, audio.sample_rate)
        {
            Ok(value) if value.is_finite() => (value, false),
            Ok(value) => {
                log::warn!("risk: embedding {value} is not finite, using population mean");
                (self.config.embedding_fallback, true)
            }
            Err(e) => {
                log::warn!("risk: embedding unavailable ({e}), using population mean");
                (self.config.embedding_fallback, true)
            }
        };

        let mut row = Vec::with_capacity(RISK_FEATURE_COUNT);
        row.push(embedding);
        row.extend(handcrafted.to_array());
        row.extend(clinical.to_array());
        Ok((row, used_fallback))
    }

    /// Assess `audio` together with the clinical answers.
    pub fn assess(
        &self,
        audio: &RawAudio,
        clinical: &ClinicalProfile,
    ) -> Result<RiskAssessment, RiskError> {
        let context = self.model.get()?;
        let (row, used_fallback_embedding) = self.feature_row(audio, clinical)?;

        let output = context.predict(&FeatureMatrix::from_row(row))?;
        if output.cols() != RiskLevel::ALL.len() {
            return Err(ModelError::Inference(format!(
                "risk model returned {} classes, expected {}",
                output.cols(),
                RiskLevel::ALL.len()
            ))
            .into());
        }
        let mut probabilities = [0.0; 3];
        probabilities.copy_from_slice(output.row(0));

        let (best, _) = probabilities
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
        let level = RiskLevel::ALL[best];

        log::info!("risk assessment: {level:?} {probabilities:?}");
        Ok(RiskAssessment {
            probabilities,
            level,
            used_fallback_embedding,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IdentityScaler, InferenceContext, ProbabilisticClassifier};
    use std::f64::consts::PI;
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    struct FixedEmbedding(f64);

    impl EmbeddingSource for FixedEmbedding {
        fn embedding(&self, _: &[f64], _: u32) -> Result<f64, RiskError> {
            Ok(self.0)
        }
    }

    /// Records the last row it saw and answers with fixed probabilities.
    struct RecordingModel {
        seen: Arc<Mutex<Vec<f64>>>,
        answer: Vec<f64>,
    }

    impl ProbabilisticClassifier for RecordingModel {
        fn predict_probability(&self, x: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
            *self.seen.lock().unwrap() = x.row(0).to_vec();
            FeatureMatrix::new(1, self.answer.len(), self.answer.clone())
        }
    }

    fn classifier(
        answer: Vec<f64>,
        embeddings: Arc<dyn EmbeddingSource>,
    ) -> (CovidRiskClassifier, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = RecordingModel {
            seen: Arc::clone(&seen),
            answer,
        };
        let slot = Arc::new(ModelSlot::loaded(InferenceContext::new(IdentityScaler, model)));
        (
            CovidRiskClassifier::new(slot, embeddings, RiskConfig::default()),
            seen,
        )
    }

    fn cough() -> RawAudio {
        let fs = 22_050.0;
        let samples = (0..22_050)
            .map(|i| {
                let t = i as f64 / fs;
                if (0.2..0.6).contains(&t) {
                    ((-(t - 0.2) * 10.0).exp() * (2.0 * PI * 450.0 * t).sin()) as f32
                } else {
                    0.0
                }
            })
            .collect();
        RawAudio::mono(samples, 22_050)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn row_layout_is_embedding_audio_clinical() {
        let (clf, seen) = classifier(vec![0.1, 0.2, 0.7], Arc::new(FixedEmbedding(0.42)));
        let clinical = ClinicalProfile::new(55, true, false);

        let out = clf.assess(&cough(), &clinical).unwrap();
        assert_eq!(out.level, RiskLevel::Covid);
        assert_eq!(out.probabilities, [0.1, 0.2, 0.7]);
        assert!(!out.used_fallback_embedding);

        let row = seen.lock().unwrap().clone();
        assert_eq!(row.len(), RISK_FEATURE_COUNT);
        assert_eq!(row[0], 0.42);
        assert_eq!(&row[9..], &[55.0, 1.0, 0.0]);
        assert!(row.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn failing_embedding_uses_population_mean() {
        let (clf, seen) = classifier(vec![0.6, 0.3, 0.1], Arc::new(NoEmbedding));
        let out = clf.assess(&cough(), &ClinicalProfile::default()).unwrap();
        assert!(out.used_fallback_embedding);
        assert_eq!(out.level, RiskLevel::Healthy);
        assert_eq!(seen.lock().unwrap()[0], RiskConfig::default().embedding_fallback);
    }

    #[test]
    fn non_finite_embedding_uses_population_mean() {
        let (clf, _) = classifier(vec![0.2, 0.5, 0.3], Arc::new(FixedEmbedding(f64::NAN)));
        let out = clf.assess(&cough(), &ClinicalProfile::default()).unwrap();
        assert!(out.used_fallback_embedding);
        assert_eq!(out.level, RiskLevel::Symptomatic);
    }

    #[test]
    fn silent_audio_is_an_error_not_zeros() {
        let (clf, seen) = classifier(vec![0.2, 0.5, 0.3], Arc::new(NoEmbedding));
        let silent = RawAudio::mono(vec![0.0; 22_050], 22_050);
        assert!(matches!(
            clf.assess(&silent, &ClinicalProfile::default()),
            Err(RiskError::Features(_))
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn wrong_class_count_is_rejected() {
        let (clf, _) = classifier(vec![0.5, 0.5], Arc::new(NoEmbedding));
        assert!(matches!(
            clf.assess(&cough(), &ClinicalProfile::default()),
            Err(RiskError::Model(ModelError::Inference(_)))
        ));
    }

    #[test]
    fn missing_model_is_unavailable() {
        let clf = CovidRiskClassifier::new(
            Arc::new(ModelSlot::new()),
            Arc::new(NoEmbedding),
            RiskConfig::default(),
        );
        assert!(matches!(
            clf.assess(&cough(), &ClinicalProfile::default()),
            Err(RiskError::Model(ModelError::Unavailable(_)))
        ));
    }
}
