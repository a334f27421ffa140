//! Handcrafted audio descriptors for the risk classifier.
//!
//! | # | Feature | Computed on |
//! |---|---------|-------------|
//! | 0 | duration (s) | trimmed |
//! | 1 | onset count | trimmed, mel spectral flux |
//! | 2 | envelope period (s) | whole clip, Hilbert envelope |
//! | 3–6 | frame RMS max / median / 25th pct / skewness | trimmed |
//! | 7 | mean spectral bandwidth (Hz) | trimmed |
//!
//! The clip is peak-normalized first; trimming drops leading and trailing
//! frames more than [`TRIM_TOP_DB`] below the loudest frame.

use serde::{Deserialize, Serialize};

use crate::dsp::mel::{mel_power_spectrogram, power_to_db, MelParams};
use crate::dsp::peaks::{pick_peaks, PeakPicking};
use crate::dsp::spectrum::{fft, ifft, stft_magnitude};
use crate::dsp::{stats, DspError};

use super::RiskError;

/// Number of values produced by [`RiskAudioFeatures::to_array`].
pub const AUDIO_FEATURE_COUNT: usize = 8;

pub const AUDIO_FEATURE_NAMES: [&str; AUDIO_FEATURE_COUNT] = [
    "duration",
    "onset_count",
    "envelope_period",
    "rms_max",
    "rms_median",
    "rms_p25",
    "rms_skew",
    "spectral_bandwidth",
];

/// Frames quieter than this many dB below the loudest frame are silence.
pub const TRIM_TOP_DB: f64 = 60.0;

const RMS_FRAME: usize = 2048;
const RMS_HOP: usize = 512;
const ONSET_DELTA: f64 = 0.07;
const DB_FLOOR: f64 = 80.0;
const AMIN: f64 = 1e-10;

// ---------------------------------------------------------------------------
// RiskAudioFeatures
// ---------------------------------------------------------------------------

/// The eight audio descriptors fed to the risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAudioFeatures {
    pub duration_secs: f64,
    pub onset_count: usize,
    pub envelope_period_secs: f64,
    pub rms_max: f64,
    pub rms_median: f64,
    pub rms_p25: f64,
    pub rms_skew: f64,
    pub spectral_bandwidth_hz: f64,
}

impl RiskAudioFeatures {
    /// Compute the descriptors for mono `samples` at `sample_rate` Hz.
    ///
    /// `bandwidth_reference_rate` is the rate the spectral-bandwidth bins are
    /// labelled with.
    pub fn extract(
        samples: &[f64],
        sample_rate: u32,
        bandwidth_reference_rate: u32,
    ) -> Result<Self, RiskError> {
        if sample_rate < 20 || bandwidth_reference_rate == 0 {
            return Err(RiskError::Features(format!(
                "unusable sample rates {sample_rate} / {bandwidth_reference_rate} Hz"
            )));
        }
        if let Some(i) = samples.iter().position(|v| !v.is_finite()) {
            return Err(RiskError::Features(format!("non-finite sample at index {i}")));
        }
        let peak = stats::peak(samples);
        if peak == 0.0 {
            return Err(RiskError::Features("recording is silent".into()));
        }
        let fs = sample_rate as f64;
        let normalized: Vec<f64> = samples.iter().map(|v| v / peak).collect();

        let frame = sample_rate as usize / 10;
        let hop = frame / 2;
        let trimmed = trim_silence(&normalized, frame, hop, TRIM_TOP_DB);
        if trimmed.len() < 3 {
            return Err(RiskError::Features(format!(
                "only {} samples left after trimming silence",
                trimmed.len()
            )));
        }

        let envelope = onset_envelope(trimmed, fs)?;
        let onset_count = count_onsets(&envelope, fs, MelParams::default().hop).len();
        let envelope_period_secs = envelope_period(&normalized, fs)?;

        let rms = frame_rms(trimmed, RMS_FRAME, RMS_HOP);
        let too_short = || RiskError::Features("too few RMS frames".into());
        let rms_max = rms.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let rms_median = stats::percentile(&rms, 50.0).ok_or_else(too_short)?;
        let rms_p25 = stats::percentile(&rms, 25.0).ok_or_else(too_short)?;
        let rms_skew = stats::skewness(&rms).ok_or_else(too_short)?;

        let spectral_bandwidth_hz =
            mean_spectral_bandwidth(trimmed, frame, hop, bandwidth_reference_rate as f64)?;

        let features = Self {
            duration_secs: trimmed.len() as f64 / fs,
            onset_count,
            envelope_period_secs,
            rms_max,
            rms_median,
            rms_p25,
            rms_skew,
            spectral_bandwidth_hz,
        };
        if let Some((name, value)) = AUDIO_FEATURE_NAMES
            .iter()
            .zip(features.to_array())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(RiskError::Features(format!("{name} is not finite ({value})")));
        }
        log::debug!(
            "risk audio features: {:.2}s trimmed, {onset_count} onsets",
            features.duration_secs
        );
        Ok(features)
    }

    /// Values in model order.
    pub fn to_array(&self) -> [f64; AUDIO_FEATURE_COUNT] {
        [
            self.duration_secs,
            self.onset_count as f64,
            self.envelope_period_secs,
            self.rms_max,
            self.rms_median,
            self.rms_p25,
            self.rms_skew,
            self.spectral_bandwidth_hz,
        ]
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// RMS of centered, zero-padded frames.
fn frame_rms(x: &[f64], frame_len: usize, hop: usize) -> Vec<f64> {
    let pad = frame_len / 2;
    let mut padded = vec![0.0; pad];
    padded.extend_from_slice(x);
    padded.resize(padded.len() + pad, 0.0);
    if padded.len() < frame_len || hop == 0 {
        return Vec::new();
    }
    let n_frames = 1 + (padded.len() - frame_len) / hop;
    (0..n_frames)
        .map(|f| stats::rms(&padded[f * hop..f * hop + frame_len]))
        .collect()
}

/// Strip leading and trailing frames more than `top_db` below the loudest.
fn trim_silence(x: &[f64], frame_len: usize, hop: usize, top_db: f64) -> &[f64] {
    let power: Vec<f64> = frame_rms(x, frame_len, hop)
        .into_iter()
        .map(|r| r * r)
        .collect();
    let reference = power.iter().cloned().fold(AMIN, f64::max);
    let loud = |p: &f64| 10.0 * (p.max(AMIN) / reference).log10() > -top_db;

    let (Some(first), Some(last)) = (power.iter().position(loud), power.iter().rposition(loud))
    else {
        return &x[..0];
    };
    let start = (first * hop).min(x.len());
    let end = ((last + 1) * hop).min(x.len());
    &x[start..end]
}

/// Mean positive mel-dB flux per frame, aligned to the centered frames.
fn onset_envelope(x: &[f64], fs: f64) -> Result<Vec<f64>, DspError> {
    let params = MelParams::default();
    let mut mel = mel_power_spectrogram(x, fs, params)?;
    power_to_db(&mut mel, Some(DB_FLOOR));

    let lead = 1 + params.n_fft / (2 * params.hop);
    let mut envelope = vec![0.0; lead];
    envelope.extend(mel.windows(2).map(|pair| {
        let flux: f64 = pair[1]
            .iter()
            .zip(&pair[0])
            .map(|(now, before)| (now - before).max(0.0))
            .sum();
        flux / pair[1].len().max(1) as f64
    }));
    envelope.truncate(mel.len());
    Ok(envelope)
}

/// Onset frames picked from a flux envelope with `hop`-sample frames.
fn count_onsets(envelope: &[f64], fs: f64, hop: usize) -> Vec<usize> {
    if envelope.iter().all(|&v| v == 0.0) {
        return Vec::new();
    }
    let min = envelope.iter().cloned().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = envelope.iter().map(|v| v - min).collect();
    let max = shifted.iter().cloned().fold(0.0, f64::max);
    let normalized: Vec<f64> = shifted
        .iter()
        .map(|v| v / (max + f64::MIN_POSITIVE))
        .collect();

    let frames = |secs: f64| (secs * fs / hop as f64).floor() as usize;
    pick_peaks(
        &normalized,
        PeakPicking {
            pre_max: frames(0.03),
            post_max: 1,
            pre_avg: frames(0.10),
            post_avg: frames(0.10) + 1,
            delta: ONSET_DELTA,
            wait: frames(0.03),
        },
    )
}

/// Dominant period of the Hilbert amplitude envelope, in seconds.
fn envelope_period(x: &[f64], fs: f64) -> Result<f64, DspError> {
    let n = x.len();
    if n < 8 {
        return Err(DspError::TooShort { needed: 8, got: n });
    }

    // Analytic signal: keep DC (and Nyquist), double positive bins, zero the rest.
    let mut spectrum = fft(x);
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let gain = if k == 0 || (n % 2 == 0 && k == n / 2) {
            1.0
        } else if k < n.div_ceil(2) {
            2.0
        } else {
            0.0
        };
        *bin *= gain;
    }
    let envelope: Vec<f64> = ifft(&spectrum).iter().map(|c| c.norm()).collect();

    let magnitude: Vec<f64> = fft(&envelope).iter().map(|c| c.norm()).collect();
    let search = &magnitude[3..n / 2];
    let offset = search
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &m)| if m > best.1 { (i, m) } else { best })
        .0;

    // Offset of 2 (not 3) reproduces the feature the risk model was fitted on.
    let total_secs = n as f64 / fs;
    Ok(total_secs / (offset + 2) as f64)
}

/// Mean per-frame spectral bandwidth (p = 2) of a centered STFT.
fn mean_spectral_bandwidth(
    x: &[f64],
    n_fft: usize,
    hop: usize,
    reference_rate: f64,
) -> Result<f64, DspError> {
    let magnitude = stft_magnitude(x, n_fft, hop)?;
    let n_bins = n_fft / 2 + 1;
    let bin_hz = reference_rate / (2 * (n_bins - 1).max(1)) as f64;

    let per_frame: Vec<f64> = magnitude
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().sum();
            if total <= f64::MIN_POSITIVE {
                return 0.0;
            }
            let centroid: f64 = frame
                .iter()
                .enumerate()
                .map(|(k, m)| k as f64 * bin_hz * m / total)
                .sum();
            frame
                .iter()
                .enumerate()
                .map(|(k, m)| m / total * (k as f64 * bin_hz - centroid).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect();
    Ok(stats::mean(&per_frame))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
