//! Mel filterbanks, decibel scaling and MFCC computation.
//!
//! The mel scale is the Slaney variant: linear below 1 kHz, logarithmic
//! above, and every triangular filter is area-normalized.

use std::f64::consts::PI;

use super::spectrum::{rfft_frequencies, stft_magnitude};
use super::DspError;

/// Analysis parameters for mel-scaled spectrograms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MelParams {
    pub n_fft: usize,
    pub hop: usize,
    pub n_mels: usize,
}

impl Default for MelParams {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop: 512,
            n_mels: 128,
        }
    }
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank covering `[0, sr/2]`; `n_mels × (n_fft/2 + 1)`.
pub fn mel_filterbank(sr: f64, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let fft_freqs = rfft_frequencies(n_fft, sr);
    let (mel_lo, mel_hi) = (hz_to_mel(0.0), hz_to_mel(sr / 2.0));
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_lo + (mel_hi - mel_lo) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (mel_f[m], mel_f[m + 1], mel_f[m + 2]);
            let enorm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Convert power values to decibels (reference 1.0, floor `1e-10`) and clip
/// everything more than `top_db` below the global maximum.
pub fn power_to_db(spec: &mut [Vec<f64>], top_db: Option<f64>) {
    const AMIN: f64 = 1e-10;
    let mut max_db = f64::NEG_INFINITY;
    for v in spec.iter_mut().flat_map(|row| row.iter_mut()) {
        *v = 10.0 * v.max(AMIN).log10();
        max_db = max_db.max(*v);
    }
    if let Some(top) = top_db {
        let floor = max_db - top;
        spec.iter_mut()
            .flat_map(|row| row.iter_mut())
            .for_each(|v| *v = v.max(floor));
    }
}

/// Mel power spectrogram, `frames × n_mels`.
pub fn mel_power_spectrogram(x: &[f64], sr: f64, params: MelParams) -> Result<Vec<Vec<f64>>, DspError> {
    let magnitude = stft_magnitude(x, params.n_fft, params.hop)?;
    let bank = mel_filterbank(sr, params.n_fft, params.n_mels);

    Ok(magnitude
        .iter()
        .map(|frame| {
            bank.iter()
                .map(|filter| {
                    filter
                        .iter()
                        .zip(frame)
                        .map(|(w, m)| w * m * m)
                        .sum::<f64>()
                })
                .collect()
        })
        .collect())
}

/// First `n_out` orthonormal DCT-II coefficients of `x`.
pub fn dct2_ortho(x: &[f64], n_out: usize) -> Vec<f64> {
    let n = x.len() as f64;
    (0..n_out)
        .map(|k| {
            let sum: f64 = x
                .iter()
                .enumerate()
                .map(|(i, v)| v * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .sum();
            let norm = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * norm
        })
        .collect()
}

/// Mel-frequency cepstral coefficients, `frames × n_mfcc`.
pub fn mfcc(x: &[f64], sr: f64, n_mfcc: usize, params: MelParams) -> Result<Vec<Vec<f64>>, DspError> {
    if n_mfcc > params.n_mels {
        return Err(DspError::InvalidParameter(format!(
            "cannot take {n_mfcc} coefficients from {} mel bands",
            params.n_mels
        )));
    }
    let mut mel = mel_power_spectrogram(x, sr, params)?;
    power_to_db(&mut mel, Some(80.0));
    Ok(mel.iter().map(|frame| dct2_ortho(frame, n_mfcc)).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
