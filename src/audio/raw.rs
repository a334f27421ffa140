//! Raw recordings as handed over by the capture collaborator, plus the
//! input validation shared by every stage.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use thiserror::Error;

use crate::dsp::DspError;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Reasons the preprocessor or segmenter refuse a recording.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    /// Empty, non-finite or structurally malformed audio.
    #[error("invalid audio input: {0}")]
    InvalidInput(String),

    /// The recording rate cannot support the requested cutoff.
    #[error("sample rate {sample_rate} Hz is below the required {required} Hz (2 × cutoff)")]
    InvalidSampleRate { sample_rate: u32, required: u32 },

    /// A processing parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<DspError> for AudioError {
    fn from(err: DspError) -> Self {
        match err {
            DspError::Empty | DspError::TooShort { .. } => AudioError::InvalidInput(err.to_string()),
            DspError::InvalidParameter(_) | DspError::Singular => {
                AudioError::InvalidConfiguration(err.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RawAudio
// ---------------------------------------------------------------------------

/// A recording exactly as captured.
///
/// Samples are interleaved `f32`; `channels == 1` for mono.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudio {
    /// Interleaved PCM samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

impl RawAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Mono recording.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }

    /// Recording length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Check the recording is usable: non-empty, finite, a positive sample
    /// rate, and a whole number of frames.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidInput("sample rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(AudioError::InvalidInput("channel count must be positive".into()));
        }
        if self.samples.len() % self.channels as usize != 0 {
            return Err(AudioError::InvalidInput(format!(
                "{} samples do not divide into {} channels",
                self.samples.len(),
                self.channels
            )));
        }
        validate_samples(&self.samples)
    }

    /// Average all channels into a single `f64` channel.
    pub fn to_mono(&self) -> Vec<f64> {
        downmix(&self.samples, self.channels)
    }

    /// Hash of the recording content for in-process memoization.
    ///
    /// Built on `DefaultHasher`, so values are only comparable within one
    /// process and must not be persisted.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.sample_rate.hash(&mut hasher);
        self.channels.hash(&mut hasher);
        self.samples.len().hash(&mut hasher);
        for s in &self.samples {
            s.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Reject empty buffers and buffers containing NaN or infinities.
pub fn validate_samples(samples: &[f32]) -> Result<(), AudioError> {
    if samples.is_empty() {
        return Err(AudioError::InvalidInput("audio has zero length".into()));
    }
    if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
        return Err(AudioError::InvalidInput(format!(
            "non-finite sample at index {idx}"
        )));
    }
    Ok(())
}

/// Mix interleaved multi-channel audio down to mono by averaging all
/// channels. The output length is `samples.len() / channels`; zero channels
/// yield an empty vector.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f64> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().map(|&s| s as f64).collect(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / n as f64)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
