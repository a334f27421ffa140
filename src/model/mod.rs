//! Inference seam: the trained scaler and classifier are opaque trait
//! objects supplied by the host.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ ModelSlot (OnceLock<Arc<InferenceContext>>)   │
//! │                                               │
//! │   FeatureMatrix ─▶ FeatureScaler::transform   │
//! │                 ─▶ ProbabilisticClassifier    │
//! │                      ::predict_probability    │
//! │                 ─▶ rows × n_classes           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! [`IdentityScaler`] and the JSON-backed [`StandardScaler`] ship with the
//! crate; classifiers always come from outside.

pub mod context;
pub mod scaler;

pub use context::{
    FeatureMatrix, FeatureScaler, InferenceContext, ModelError, ModelSlot, ProbabilisticClassifier,
};
pub use scaler::{ArtifactPaths, IdentityScaler, StandardScaler};

#[cfg(test)]
pub use context::MockClassifier;
