//! Audio front end: raw recordings → canonical signal → cough segments.
//!
//! # Pipeline
//!
//! ```text
//! RawAudio → SignalPreprocessor (mono, normalize, low-pass, decimate)
//!          → PreprocessedAudio → FeatureExtractor
//!                              ↘ CoughSegmenter → Segmentation
//! RecordingQuality bounds the duration; MicrophoneQuality grades the rate.
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use cough_screen::audio::{RawAudio, SignalPreprocessor};
//!
//! let audio = RawAudio::new(vec![0.0_f32; 96_000], 48_000, 2);
//! let clean = SignalPreprocessor::default().process(&audio).unwrap();
//! assert_eq!(clean.sample_rate, 12_000);
//! ```

pub mod preprocess;
pub mod quality;
pub mod raw;
pub mod segment;

pub use preprocess::{PreprocessConfig, PreprocessedAudio, SignalPreprocessor};
pub use quality::{MicrophoneQuality, QualityIssue, RecordingQuality};
pub use raw::{downmix, AudioError, RawAudio};
pub use segment::{segment_cough, CoughSegment, CoughSegmenter, Segmentation, SegmentationParams};
