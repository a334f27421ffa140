//! Cough screening: preprocessing, segmentation and feature extraction for
//! cough recordings, plus cough detection and Covid-19 risk assessment
//! through host-supplied models.
//!
//! # Module map
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`dsp`] | Filters, FFT/Welch/STFT, mel/MFCC, peak picking, statistics |
//! | [`audio`] | `RawAudio`, preprocessing, cough segmentation, recording review |
//! | [`features`] | Static registry of feature families, `FeatureVector` |
//! | [`model`] | Scaler / classifier traits and the one-time `ModelSlot` |
//! | [`pipeline`] | `CoughDetectionPipeline` and the async `ClassificationService` |
//! | [`risk`] | Covid risk classifier (handcrafted + embedding + clinical) |
//! | [`config`] | TOML settings and platform paths |
//! | [`logging`] | `env_logger` bootstrap |
//!
//! # Quick start
//!
//! ```rust
//! use cough_screen::audio::{segment_cough, RawAudio, SegmentationParams};
//! use cough_screen::features::extract_features;
//!
//! let tone: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.06).sin() * 0.5).collect();
//! let features = extract_features(&RawAudio::mono(tone, 44_100)).unwrap();
//! assert_eq!(features.len(), 68);
//!
//! let silence = vec![0.0_f32; 44_100];
//! let segmentation = segment_cough(&silence, 44_100, &SegmentationParams::default()).unwrap();
//! assert!(!segmentation.has_cough());
//! ```

pub mod audio;
pub mod config;
pub mod dsp;
pub mod features;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod risk;

pub use audio::{RawAudio, SegmentationParams};
pub use config::AppConfig;
pub use features::{extract_features, FeatureVector};
pub use pipeline::{Classification, CoughDetectionPipeline, CoughVerdict};
