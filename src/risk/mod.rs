//! Covid-19 risk assessment from a cough, an embedding and clinical answers.
//!
//! # Architecture
//!
//! ```text
//! RawAudio ──▶ RiskAudioFeatures::extract ──┐ (8)
//!          └─▶ EmbeddingSource::embedding ──┤ (1, population mean on failure)
//! ClinicalProfile::to_array ────────────────┤ (3)
//!                                           ▼
//!                     InferenceContext::predict  → [healthy, symptomatic, covid]
//!                                           ▼
//!                                 RiskAssessment { level = argmax }
//! ```
//!
//! Unlike cough detection, risk assessment never substitutes a sentinel:
//! audio-feature and model failures are returned to the caller.

pub mod audio;
pub mod classifier;
pub mod clinical;

use thiserror::Error;

use crate::audio::AudioError;
use crate::dsp::DspError;
use crate::model::ModelError;

pub use audio::{RiskAudioFeatures, AUDIO_FEATURE_NAMES};
pub use classifier::{
    CovidRiskClassifier, EmbeddingSource, NoEmbedding, RiskAssessment, RiskLevel,
    RISK_FEATURE_COUNT,
};
pub use clinical::ClinicalProfile;

// ---------------------------------------------------------------------------
// RiskError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RiskError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// A handcrafted audio feature could not be computed.
    #[error("risk audio features failed: {0}")]
    Features(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Raised by [`EmbeddingSource`] implementations.
    #[error("embedding unavailable: {0}")]
    Embedding(String),
}

impl From<DspError> for RiskError {
    fn from(err: DspError) -> Self {
        RiskError::Features(err.to_string())
    }
}
