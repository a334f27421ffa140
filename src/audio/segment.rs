//! Energy-based cough segmentation.
//!
//! [`CoughSegmenter`] finds cough events in a mono recording with a
//! hysteresis detector on per-sample power:
//!
//! * a segment **opens** when `x²` rises above `high_multiplier × rms`,
//! * it **closes** once `x²` has stayed below `low_multiplier × rms` for
//!   more than 10 ms worth of samples,
//! * both ends are widened by `padding_secs` and clamped to the signal.
//!
//! Segments whose unpadded length does not exceed `min_cough_secs` are
//! discarded. A segment still open when the signal ends is closed at the
//! last sample and goes through the same length check; accepted segments
//! (trailing ones included) are listed and marked in the mask, rejected ones
//! are neither.
//!
//! ```rust
//! use cough_screen::audio::{segment_cough, SegmentationParams};
//!
//! let mut audio = vec![0.0_f32; 8_000];
//! audio.extend(vec![0.5_f32; 2_000]);
//! audio.extend(vec![0.0_f32; 6_000]);
//!
//! let seg = segment_cough(&audio, 8_000, &SegmentationParams::default()).unwrap();
//! assert_eq!(seg.segments.len(), 1);
//! assert_eq!(seg.segments[0].start, 8_000 - 1_600);
//! ```

use serde::{Deserialize, Serialize};

use super::raw::{validate_samples, AudioError};

/// Below-threshold run, in seconds, that ends an active segment.
const CLOSE_AFTER_SECS: f64 = 0.01;

// ---------------------------------------------------------------------------
// SegmentationParams
// ---------------------------------------------------------------------------

/// Tunables for [`CoughSegmenter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    /// Seconds added before and after every detected event.
    pub padding_secs: f64,
    /// Minimum unpadded event length in seconds, `[0.1, 0.2]`.
    pub min_cough_secs: f64,
    /// Closing threshold as a multiple of the signal RMS.
    pub low_threshold_multiplier: f64,
    /// Opening threshold as a multiple of the signal RMS, `[0.5, 2.0]`.
    pub high_threshold_multiplier: f64,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            padding_secs: 0.2,
            min_cough_secs: 0.1,
            low_threshold_multiplier: 0.1,
            high_threshold_multiplier: 0.5,
        }
    }
}

impl SegmentationParams {
    pub fn validate(&self) -> Result<(), AudioError> {
        let bad = |what: &str, v: f64| {
            Err(AudioError::InvalidConfiguration(format!("{what} out of range: {v}")))
        };
        if !self.padding_secs.is_finite() || self.padding_secs < 0.0 {
            return bad("padding_secs", self.padding_secs);
        }
        if !(0.1..=0.2).contains(&self.min_cough_secs) {
            return bad("min_cough_secs", self.min_cough_secs);
        }
        if !(0.5..=2.0).contains(&self.high_threshold_multiplier) {
            return bad("high_threshold_multiplier", self.high_threshold_multiplier);
        }
        if !self.low_threshold_multiplier.is_finite()
            || self.low_threshold_multiplier <= 0.0
            || self.low_threshold_multiplier > self.high_threshold_multiplier
        {
            return bad("low_threshold_multiplier", self.low_threshold_multiplier);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CoughSegment / Segmentation
// ---------------------------------------------------------------------------

/// Inclusive, padded sample range `[start, end]` of one cough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoughSegment {
    pub start: usize,
    pub end: usize,
}

impl CoughSegment {
    /// Number of samples covered (both ends inclusive).
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    /// Borrow the segment out of the buffer it was detected in.
    pub fn slice<'a, T>(&self, samples: &'a [T]) -> &'a [T] {
        &samples[self.start..=self.end]
    }

    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }
}

/// Detected segments plus a per-sample cough mask.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segmentation {
    pub segments: Vec<CoughSegment>,
    /// `mask[i]` is `true` iff sample `i` lies inside an accepted segment.
    pub mask: Vec<bool>,
}

impl Segmentation {
    pub fn has_cough(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Fraction of samples marked as cough.
    pub fn coverage(&self) -> f64 {
        if self.mask.is_empty() {
            return 0.0;
        }
        self.mask.iter().filter(|&&m| m).count() as f64 / self.mask.len() as f64
    }
}

// ---------------------------------------------------------------------------
// CoughSegmenter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Active { start: usize, below: usize },
}

/// Hysteresis cough detector. See the module docs for the algorithm.
#[derive(Debug, Clone)]
pub struct CoughSegmenter {
    params: SegmentationParams,
}

impl CoughSegmenter {
    /// Fails with [`AudioError::InvalidConfiguration`] for out-of-range
    /// parameters.
    pub fn new(params: SegmentationParams) -> Result<Self, AudioError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    /// Segment `samples` recorded at `sample_rate` Hz.
    pub fn segment(&self, samples: &[f32], sample_rate: u32) -> Result<Segmentation, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidInput("sample rate must be positive".into()));
        }
        validate_samples(samples)?;

        let fs = sample_rate as f64;
        let padding = (fs * self.params.padding_secs).round() as usize;
        let min_samples = (fs * self.params.min_cough_secs).round() as i64;
        let tolerance = (fs * CLOSE_AFTER_SECS).round() as usize;

        let rms = (samples.iter().map(|&s| (s as f64).powi(2)).sum::<f64>()
            / samples.len() as f64)
            .sqrt();
        let low = self.params.low_threshold_multiplier * rms;
        let high = self.params.high_threshold_multiplier * rms;

        let last = samples.len() - 1;
        let mut out = Segmentation {
            segments: Vec::new(),
            mask: vec![false; samples.len()],
        };
        let accept = |start: usize, end: usize, out: &mut Segmentation| {
            let unpadded = end as i64 + 1 - start as i64 - 2 * padding as i64;
            if unpadded > min_samples {
                out.mask[start..=end].iter_mut().for_each(|m| *m = true);
                out.segments.push(CoughSegment { start, end });
            } else {
                log::trace!("segment [{start}, {end}] rejected: {unpadded} samples");
            }
        };

        let mut state = State::Idle;
        for (i, &s) in samples.iter().enumerate() {
            let power = (s as f64).powi(2);
            state = match state {
                State::Idle if power > high => State::Active {
                    start: i.saturating_sub(padding),
                    below: 0,
                },
                State::Idle => State::Idle,
                State::Active { start, below } if power < low => {
                    if below + 1 > tolerance {
                        accept(start, (i + padding).min(last), &mut out);
                        State::Idle
                    } else {
                        State::Active { start, below: below + 1 }
                    }
                }
                State::Active { start, .. } => State::Active { start, below: 0 },
            };
        }
        if let State::Active { start, .. } = state {
            accept(start, last, &mut out);
        }

        log::debug!(
            "segmentation: {} segment(s) in {} samples @ {sample_rate} Hz (rms {rms:.4})",
            out.segments.len(),
            samples.len()
        );
        Ok(out)
    }
}

/// Validate `params` and segment `samples` in one call.
pub fn segment_cough(
    samples: &[f32],
    sample_rate: u32,
    params: &SegmentationParams,
) -> Result<Segmentation, AudioError> {
    CoughSegmenter::new(*params)?.segment(samples, sample_rate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FS: u32 = 8_000;
    // 0.2 s padding and 10 ms tolerance at 8 kHz.
    const PAD: usize = 1_600;
    const TOL: usize = 80;

    fn signal(len: usize, bursts: &[(usize, usize)]) -> Vec<f32> {
        let mut v = vec![0.0_f32; len];
        for &(from, to) in bursts {
            v[from..to].iter_mut().for_each(|s| *s = 0.5);
        }
        v
    }

    fn seg(samples: &[f32]) -> Segmentation {
        segment_cough(samples, FS, &SegmentationParams::default()).unwrap()
    }

    #[test]
    fn single_burst_in_silence() {
        let audio = signal(16_000, &[(4_000, 6_000)]);
        let out = seg(&audio);
        assert_eq!(out.segments.len(), 1);
        let s = out.segments[0];
        assert_eq!(s.start, 4_000 - PAD);
        // Closing fires on the (TOL + 1)-th quiet sample.
        assert_eq!(s.end, 6_000 + TOL + PAD);
        for (i, &m) in out.mask.iter().enumerate() {
            assert_eq!(m, (s.start..=s.end).contains(&i), "mask at {i}");
        }
    }

    #[test]
    fn padding_is_clamped_at_the_edges() {
        let audio = signal(8_000, &[(500, 2_500)]);
        let out = seg(&audio);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].start, 0);
    }

    #[test]
    fn low_energy_noise_yields_nothing() {
        // |x| <= 0.05 keeps x² far below 0.5 × rms.
        let mut state = 12_345_u32;
        let audio: Vec<f32> = (0..16_000)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((state >> 16) as f32 / 65_535.0 - 0.5) * 0.1
            })
            .collect();
        let out = seg(&audio);
        assert!(out.segments.is_empty());
        assert!(out.mask.iter().all(|&m| !m));
    }

    #[test]
    fn silence_yields_nothing() {
        let out = seg(&vec![0.0; 4_000]);
        assert!(!out.has_cough());
        assert_eq!(out.coverage(), 0.0);
    }

    #[test]
    fn short_burst_is_rejected() {
        let audio = signal(16_000, &[(2_000, 4_000), (10_000, 10_100)]);
        let out = seg(&audio);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].start, 2_000 - PAD);
        assert!(!out.mask[10_050]);
    }

    #[test]
    fn accepted_trailing_segment_is_listed_and_masked() {
        let audio = signal(16_000, &[(12_000, 16_000)]);
        let out = seg(&audio);
        assert_eq!(out.segments, vec![CoughSegment { start: 12_000 - PAD, end: 15_999 }]);
        assert!(out.mask[15_999]);
        assert!(out.mask[12_000 - PAD]);
        assert!(!out.mask[12_000 - PAD - 1]);
    }

    #[test]
    fn rejected_trailing_segment_is_neither_listed_nor_masked() {
        let audio = signal(16_000, &[(2_000, 4_000), (15_800, 16_000)]);
        let out = seg(&audio);
        assert_eq!(out.segments.len(), 1);
        assert!(out.mask[..14_000].iter().any(|&m| m));
        assert!(out.mask[14_000..].iter().all(|&m| !m));
    }

    #[test]
    fn two_bursts_two_segments() {
        let audio = signal(40_000, &[(5_000, 7_000), (25_000, 27_000)]);
        let out = seg(&audio);
        assert_eq!(out.segments.len(), 2);
        assert!(out.segments[0].end < out.segments[1].start);
        let first = out.segments[0];
        assert_eq!(first.slice(&audio).len(), first.len());
    }

    #[test]
    fn invalid_input_rejected() {
        let params = SegmentationParams::default();
        assert!(matches!(
            segment_cough(&[], FS, &params),
            Err(AudioError::InvalidInput(_))
        ));
        assert!(matches!(
            segment_cough(&[0.1, f32::NAN], FS, &params),
            Err(AudioError::InvalidInput(_))
        ));
        assert!(matches!(
            segment_cough(&[0.1; 10], 0, &params),
            Err(AudioError::InvalidInput(_))
        ));
    }

    #[test]
    fn out_of_range_params_rejected() {
        let cases = [
            SegmentationParams { min_cough_secs: 0.05, ..Default::default() },
            SegmentationParams { min_cough_secs: 0.3, ..Default::default() },
            SegmentationParams { high_threshold_multiplier: 2.5, ..Default::default() },
            SegmentationParams { high_threshold_multiplier: 0.4, ..Default::default() },
            SegmentationParams { padding_secs: -0.1, ..Default::default() },
            SegmentationParams { low_threshold_multiplier: 0.0, ..Default::default() },
        ];
        for params in cases {
            assert!(
                matches!(CoughSegmenter::new(params), Err(AudioError::InvalidConfiguration(_))),
                "{params:?}"
            );
        }
    }

    #[test]
    fn boundary_params_accepted() {
        let params = SegmentationParams {
            min_cough_secs: 0.2,
            high_threshold_multiplier: 2.0,
            ..Default::default()
        };
        assert!(CoughSegmenter::new(params).is_ok());
    }

    #[test]
    fn segmentation_is_deterministic() {
        let audio = signal(20_000, &[(3_000, 5_000), (12_000, 14_500)]);
        assert_eq!(seg(&audio), seg(&audio));
    }
}
