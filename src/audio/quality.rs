//! Recording review.
//!
//! [`MicrophoneQuality`] grades the capture device from its sample rate, the
//! way the screening app reports it before recording. [`RecordingQuality`]
//! holds the duration limits the classification service enforces.
//!
//! ```rust
//! use cough_screen::audio::{MicrophoneQuality, QualityIssue, RawAudio, RecordingQuality};
//!
//! let review = RecordingQuality::new(0.5, 10.0);
//! assert!(review.check(&RawAudio::mono(vec![0.1; 22_050], 44_100)).is_ok());
//! assert!(matches!(
//!     review.check(&RawAudio::mono(vec![0.1; 100], 44_100)),
//!     Err(QualityIssue::TooShort { .. })
//! ));
//!
//! assert_eq!(MicrophoneQuality::from_sample_rate(48_000), MicrophoneQuality::Good);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::RawAudio;

// ---------------------------------------------------------------------------
// QualityIssue
// ---------------------------------------------------------------------------

/// Reason a recording is refused before classification.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QualityIssue {
    #[error("recording too short: {got_secs:.2}s (minimum {min_secs:.2}s)")]
    TooShort { min_secs: f32, got_secs: f32 },

    #[error("recording too long: {got_secs:.2}s (maximum {max_secs:.2}s)")]
    TooLong { max_secs: f32, got_secs: f32 },

    #[error("sample rate must be positive")]
    NoSampleRate,
}

// ---------------------------------------------------------------------------
// MicrophoneQuality
// ---------------------------------------------------------------------------

/// Coarse grade of the capture device, judged by its sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicrophoneQuality {
    Poor,
    Fair,
    Good,
}

impl MicrophoneQuality {
    /// `≤ 16 kHz` is poor, `≤ 22.1 kHz` fair, anything above good.
    pub fn from_sample_rate(sample_rate: u32) -> Self {
        match sample_rate {
            0..=16_000 => MicrophoneQuality::Poor,
            16_001..=22_100 => MicrophoneQuality::Fair,
            _ => MicrophoneQuality::Good,
        }
    }

    /// Grade of the device that produced `audio`.
    pub fn of(audio: &RawAudio) -> Self {
        Self::from_sample_rate(audio.sample_rate)
    }
}

impl std::fmt::Display for MicrophoneQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MicrophoneQuality::Poor => "poor",
            MicrophoneQuality::Fair => "fair",
            MicrophoneQuality::Good => "good",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// RecordingQuality
// ---------------------------------------------------------------------------

/// Accepted recording length, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingQuality {
    pub min_recording_secs: f32,
    pub max_recording_secs: f32,
}

impl Default for RecordingQuality {
    fn default() -> Self {
        Self::new(0.5, 10.0)
    }
}

impl RecordingQuality {
    pub fn new(min_secs: f32, max_secs: f32) -> Self {
        Self {
            min_recording_secs: min_secs,
            max_recording_secs: max_secs,
        }
    }

    /// Check `frames` samples per channel at `sample_rate` Hz against the
    /// limits.
    pub fn check_duration(&self, frames: usize, sample_rate: u32) -> Result<(), QualityIssue> {
        if sample_rate == 0 {
            return Err(QualityIssue::NoSampleRate);
        }
        let got_secs = frames as f32 / sample_rate as f32;

        if got_secs < self.min_recording_secs {
            return Err(QualityIssue::TooShort {
                min_secs: self.min_recording_secs,
                got_secs,
            });
        }
        if got_secs > self.max_recording_secs {
            return Err(QualityIssue::TooLong {
                max_secs: self.max_recording_secs,
                got_secs,
            });
        }
        Ok(())
    }

    /// Duration check for a whole recording, counted in frames so that
    /// interleaved channels do not inflate it.
    pub fn check(&self, audio: &RawAudio) -> Result<(), QualityIssue> {
        self.check_duration(audio.frames(), audio.sample_rate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
