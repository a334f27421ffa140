//! Cough-detection pipeline and its async service front.
//!
//! # Architecture
//!
//! ```text
//! RawAudio
//!    │
//!    ▼
//! ClassificationService::classify()  ← async, bounded by a Semaphore
//!    │
//!    ├─ RecordingQuality::check     (reject → sentinel)
//!    └─ timeout(spawn_blocking(...))
//!          │
//!          ▼
//!       CoughDetectionPipeline::classify()
//!          ├─ memo cache lookup (content hash)
//!          ├─ SignalPreprocessor::process
//!          ├─ FeatureExtractor::extract       (detection families)
//!          └─ InferenceContext::class_probability(.., 1)
//!                │
//!                ▼
//!          Classification { confidence, verdict, diagnostic }
//! ```
//!
//! Every failure below the pipeline is a typed error; only
//! [`CoughDetectionPipeline::classify`] and the service downgrade them to the
//! `0.0` sentinel, and they always log the cause.

pub mod detector;
pub mod service;

use thiserror::Error;

use crate::audio::{AudioError, QualityIssue};
use crate::features::ExtractionError;
use crate::model::ModelError;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use detector::{Classification, CoughDetectionPipeline, CoughVerdict};
pub use service::ClassificationService;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that can surface while classifying a recording.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The recording was refused before any processing.
    #[error("recording rejected: {0}")]
    Rejected(#[from] QualityIssue),

    #[error("classification timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Internal / unexpected error (e.g. tokio join failure).
    #[error("internal error: {0}")]
    Internal(String),
}
