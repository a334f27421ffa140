//! Canonicalization of raw recordings.
//!
//! [`SignalPreprocessor`] turns any [`RawAudio`] into the form every feature
//! family expects:
//!
//! 1. downmix to mono,
//! 2. peak-normalize into `[-1, 1]`,
//! 3. 4th-order Butterworth low-pass at the cutoff, zero-phase,
//! 4. integer decimation with an anti-alias filter.
//!
//! The output is always labelled with `2 × cutoff` Hz (12 kHz by default),
//! whatever the integer decimation factor works out to.
//!
//! ```rust
//! use cough_screen::audio::{PreprocessConfig, RawAudio, SignalPreprocessor};
//!
//! let pre = SignalPreprocessor::new(PreprocessConfig::default());
//! let audio = RawAudio::mono(vec![0.0; 44_100], 44_100);
//! let out = pre.process(&audio).unwrap();
//! assert_eq!(out.sample_rate, 12_000);
//! assert_eq!(out.samples.len(), 14_700);
//! ```

use serde::{Deserialize, Serialize};

use crate::dsp::iir::{decimate, filtfilt, Iir};

use super::raw::{AudioError, RawAudio};

/// Guards peak normalization against all-zero input.
pub(crate) const NORMALIZE_EPSILON: f64 = 1e-17;

const LOWPASS_ORDER: usize = 4;

// ---------------------------------------------------------------------------
// PreprocessConfig
// ---------------------------------------------------------------------------

/// Preprocessing switches and cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Low-pass cutoff in Hz; the output rate is twice this value.
    pub cutoff_hz: u32,
    /// Peak-normalize into `[-1, 1]`.
    pub normalize: bool,
    /// Apply the zero-phase Butterworth low-pass.
    pub filter: bool,
    /// Decimate to the target rate.
    pub downsample: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: 6_000,
            normalize: true,
            filter: true,
            downsample: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PreprocessedAudio
// ---------------------------------------------------------------------------

/// Mono, normalized, filtered and decimated audio.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedAudio {
    pub samples: Vec<f32>,
    /// Nominal rate (`2 × cutoff`).
    pub sample_rate: u32,
}

impl PreprocessedAudio {
    /// Samples widened to `f64` for analysis.
    pub fn to_f64(&self) -> Vec<f64> {
        self.samples.iter().map(|&s| s as f64).collect()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// SignalPreprocessor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SignalPreprocessor {
    config: PreprocessConfig,
}

impl SignalPreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Output sample rate: `2 × cutoff`.
    pub fn target_rate(&self) -> u32 {
        self.config.cutoff_hz * 2
    }

    /// Integer decimation factor `floor(rate / target)`.
    ///
    /// Fails with [`AudioError::InvalidSampleRate`] when the factor would be
    /// zero.
    pub fn decimation_factor(&self, sample_rate: u32) -> Result<usize, AudioError> {
        if self.config.cutoff_hz == 0 {
            return Err(AudioError::InvalidConfiguration(
                "cutoff frequency must be positive".into(),
            ));
        }
        let target = self.target_rate();
        if sample_rate < target {
            return Err(AudioError::InvalidSampleRate {
                sample_rate,
                required: target,
            });
        }
        Ok((sample_rate / target) as usize)
    }

    /// Run the full preprocessing chain on `audio`.
    pub fn process(&self, audio: &RawAudio) -> Result<PreprocessedAudio, AudioError> {
        audio.validate()?;
        let q = self.decimation_factor(audio.sample_rate)?;
        let target = self.target_rate();

        let mut x = audio.to_mono();

        if self.config.normalize {
            let peak = x.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            let scale = peak + NORMALIZE_EPSILON;
            x.iter_mut().for_each(|v| *v /= scale);
        }

        if self.config.filter {
            let wn = target as f64 / audio.sample_rate as f64;
            // At wn == 1 the cutoff sits on Nyquist and there is nothing to remove.
            if wn < 1.0 {
                let lowpass = Iir::butterworth_lowpass(LOWPASS_ORDER, wn)?;
                x = filtfilt(&lowpass, &x)?;
            }
        }

        if self.config.downsample {
            x = decimate(&x, q)?;
        }

        log::debug!(
            "preprocess: {} frames @ {} Hz → {} samples @ {} Hz (q = {q})",
            audio.frames(),
            audio.sample_rate,
            x.len(),
            target
        );

        Ok(PreprocessedAudio {
            samples: x.into_iter().map(|v| v as f32).collect(),
            sample_rate: target,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, rate: u32, secs: f64, amplitude: f64) -> Vec<f32> {
        let n = (secs * rate as f64) as usize;
        (0..n)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / rate as f64).sin()) as f32)
            .collect()
    }

    #[test]
    fn all_zero_input_stays_zero_at_target_rate() {
        let pre = SignalPreprocessor::default();
        let out = pre.process(&RawAudio::mono(vec![0.0; 44_100], 44_100)).unwrap();
        assert_eq!(out.sample_rate, 12_000);
        assert!(out.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn decimation_factor_for_44k1() {
        let pre = SignalPreprocessor::default();
        assert_eq!(pre.target_rate(), 12_000);
        assert_eq!(pre.decimation_factor(44_100).unwrap(), 3);
        assert_eq!(pre.decimation_factor(48_000).unwrap(), 4);
        assert_eq!(pre.decimation_factor(12_000).unwrap(), 1);
    }

    #[test]
    fn output_length_is_about_a_third() {
        let pre = SignalPreprocessor::default();
        let input = tone(440.0, 44_100, 1.0, 0.3);
        let out = pre.process(&RawAudio::mono(input.clone(), 44_100)).unwrap();
        assert_eq!(out.samples.len(), (input.len() + 2) / 3);
    }

    #[test]
    fn low_sample_rate_rejected() {
        let pre = SignalPreprocessor::default();
        let err = pre
            .process(&RawAudio::mono(vec![0.1; 8_000], 8_000))
            .unwrap_err();
        assert_eq!(
            err,
            AudioError::InvalidSampleRate {
                sample_rate: 8_000,
                required: 12_000
            }
        );
    }

    #[test]
    fn output_is_normalized() {
        let pre = SignalPreprocessor::default();
        let out = pre
            .process(&RawAudio::mono(tone(300.0, 48_000, 0.5, 0.05), 48_000))
            .unwrap();
        let peak = out.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.9 && peak < 1.05, "peak {peak}");
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let pre = SignalPreprocessor::new(PreprocessConfig {
            normalize: false,
            filter: false,
            downsample: false,
            ..PreprocessConfig::default()
        });
        let out = pre
            .process(&RawAudio::new(vec![0.2, 0.4, -0.2, -0.4], 12_000, 2))
            .unwrap();
        assert_eq!(out.samples.len(), 2);
        assert!((out.samples[0] - 0.3).abs() < 1e-6);
        assert!((out.samples[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn lowpass_removes_content_above_cutoff() {
        let pre = SignalPreprocessor::new(PreprocessConfig {
            normalize: false,
            downsample: false,
            ..PreprocessConfig::default()
        });
        let out = pre
            .process(&RawAudio::mono(tone(15_000.0, 44_100, 0.5, 0.5), 44_100))
            .unwrap();
        let mid = &out.samples[2_000..out.samples.len() - 2_000];
        let peak = mid.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        assert!(peak < 0.05, "residual {peak}");
    }

    #[test]
    fn empty_and_nan_input_rejected() {
        let pre = SignalPreprocessor::default();
        assert!(matches!(
            pre.process(&RawAudio::mono(Vec::new(), 44_100)),
            Err(AudioError::InvalidInput(_))
        ));
        assert!(matches!(
            pre.process(&RawAudio::mono(vec![f32::NAN; 100], 44_100)),
            Err(AudioError::InvalidInput(_))
        ));
    }

    #[test]
    fn too_short_for_zero_phase_filter_is_invalid_input() {
        let pre = SignalPreprocessor::default();
        let err = pre.process(&RawAudio::mono(vec![0.1; 10], 44_100)).unwrap_err();
        assert!(matches!(err, AudioError::InvalidInput(_)), "{err}");
    }

    #[test]
    fn zero_cutoff_is_a_configuration_error() {
        let pre = SignalPreprocessor::new(PreprocessConfig {
            cutoff_hz: 0,
            ..PreprocessConfig::default()
        });
        assert!(matches!(
            pre.process(&RawAudio::mono(vec![0.1; 100], 44_100)),
            Err(AudioError::InvalidConfiguration(_))
        ));
    }
}
