//! Signal-processing primitives shared by the preprocessor, the feature
//! families and the risk classifier.
//!
//! | Module | Provides |
//! |--------|----------|
//! | [`iir`] | Butterworth / Chebyshev design, `lfilter`, zero-phase `filtfilt`, `decimate` |
//! | [`spectrum`] | FFT helpers, Welch PSD, centered STFT |
//! | [`mel`] | Slaney mel filterbank, dB scaling, DCT-II, MFCC |
//! | [`peaks`] | local maxima and onset peak picking |
//! | [`stats`] | mean / std / percentile / skewness, Simpson integration |

pub mod iir;
pub mod mel;
pub mod peaks;
pub mod spectrum;
pub mod stats;

use thiserror::Error;

/// Failures raised by the DSP primitives.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DspError {
    /// The input signal has no samples.
    #[error("signal is empty")]
    Empty,

    /// The input is too short for the requested operation (e.g. the padding
    /// required by zero-phase filtering).
    #[error("signal too short: need at least {needed} samples, got {got}")]
    TooShort { needed: usize, got: usize },

    /// A filter or analysis parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The steady-state system for filter initial conditions is singular.
    #[error("filter initial conditions are singular")]
    Singular,
}
