//! Frequency-domain families.

use crate::dsp::spectrum::{fft, rfft_frequencies, rfft_magnitude, welch, Psd};
use crate::dsp::stats;
use crate::dsp::DspError;

use super::registry::Signal;
use super::{FrequencyBand, EPSILON};

/// Welch segment length for the dominant-frequency estimate.
const DOMINANT_SEGMENT: usize = 256;
/// Welch segment cap for flatness and band powers.
const PSD_SEGMENT: usize = 900;
const PSD_MAX_OVERLAP: usize = 600;
const ROLLOFF_FRACTION: f64 = 0.95;
const SLOPE_BAND_HZ: (f64, f64) = (0.0, 8_000.0);

fn band_psd(signal: &Signal<'_>) -> Result<Psd, DspError> {
    let nperseg = PSD_SEGMENT.min(signal.samples.len());
    let noverlap = PSD_MAX_OVERLAP.min(nperseg / 2);
    welch(signal.samples, signal.sample_rate, nperseg, Some(noverlap))
}

/// Peak of the Welch PSD in normalized frequency (cycles per sample,
/// `[0, 0.5]`).
pub(crate) fn dominant_frequency(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let psd = welch(signal.samples, 1.0, DOMINANT_SEGMENT, None)?;
    let best = psd
        .density
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0;
    Ok(vec![psd.frequencies[best]])
}

/// Centroid, roll-off bin, spread, skewness, kurtosis and bandwidth of the
/// magnitude spectrum.
pub(crate) fn spectral_shape(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let mags = rfft_magnitude(signal.samples);
    let freqs = rfft_frequencies(signal.samples.len(), signal.sample_rate);
    let total: f64 = mags.iter().sum();

    let moment = |center: f64, p: i32| -> f64 {
        mags.iter()
            .zip(&freqs)
            .map(|(m, f)| m * (f - center).powi(p))
            .sum()
    };

    let centroid = moment(0.0, 1) / (total + EPSILON);

    let threshold = ROLLOFF_FRACTION * total;
    let mut running = 0.0;
    let rolloff = mags
        .iter()
        .position(|m| {
            running += m;
            running >= threshold
        })
        .unwrap_or(mags.len().saturating_sub(1));

    let second = moment(centroid, 2);
    let spread = (second / (total + EPSILON)).sqrt();
    let skewness = moment(centroid, 3) / (spread.powi(3) * total + EPSILON);
    let kurtosis = moment(centroid, 4) / (spread.powi(4) * total + EPSILON);
    let bandwidth = second.sqrt();

    Ok(vec![
        centroid,
        rolloff as f64,
        spread,
        skewness,
        kurtosis,
        bandwidth,
    ])
}

/// Spectral flatness (geometric over arithmetic mean) and standard deviation
/// of the Welch PSD.
pub(crate) fn flatness_and_spread(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let psd = band_psd(signal)?.density;
    let log_mean = stats::mean(&psd.iter().map(|p| (p + EPSILON).ln()).collect::<Vec<_>>());
    let flatness = log_mean.exp() / (stats::mean(&psd) + EPSILON);
    Ok(vec![flatness, stats::std_dev(&psd)])
}

/// Regression slope of the magnitude spectrum over 0–8 kHz and the spectral
/// decrease relative to the first bin.
pub(crate) fn slope_and_decrease(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let half = signal.samples.len() / 2;
    if half < 2 {
        return Err(DspError::TooShort {
            needed: 4,
            got: signal.samples.len(),
        });
    }
    let s: Vec<f64> = fft(signal.samples)
        .into_iter()
        .take(half)
        .map(|c| c.norm())
        .collect();
    let step = signal.sample_rate / 2.0 / (half - 1) as f64;
    let f: Vec<f64> = (0..half).map(|i| i as f64 * step).collect();
    let (mu_s, mu_f) = (stats::mean(&s), stats::mean(&f));

    let in_band: Vec<usize> = (0..half)
        .filter(|&i| f[i] >= SLOPE_BAND_HZ.0 && f[i] <= SLOPE_BAND_HZ.1)
        .collect();

    let (num, den) = in_band.iter().fold((0.0, 0.0), |(num, den), &i| {
        (
            num + (f[i] - mu_f) * (s[i] - mu_s),
            den + (f[i] - mu_f).powi(2),
        )
    });
    let slope = num / (den + EPSILON);

    let first = s[in_band[0]];
    let rest = &in_band[1..];
    let weighted: f64 = rest
        .iter()
        .map(|&k| (s[k] - first) / (f[k] - 1.0 + EPSILON))
        .sum();
    let mass: f64 = rest.iter().map(|&k| s[k]).sum();
    let decrease = weighted / (mass + EPSILON);

    Ok(vec![slope, decrease])
}

pub(super) fn band_names(bands: &[FrequencyBand]) -> Vec<String> {
    bands
        .iter()
        .map(|b| format!("psd_{}_{}", b.low_hz, b.high_hz))
        .collect()
}

/// Share of total PSD power (Simpson integral) falling inside each band.
pub(crate) fn band_powers(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let psd = band_psd(signal)?;
    if psd.density.len() < 2 {
        return Err(DspError::TooShort {
            needed: 2,
            got: signal.samples.len(),
        });
    }
    let dx = psd.resolution();
    let total = stats::simpson(&psd.density, dx);

    Ok(signal
        .bands
        .iter()
        .map(|band| {
            let inside: Vec<f64> = psd
                .frequencies
                .iter()
                .zip(&psd.density)
                .filter(|(f, _)| band.contains(**f))
                .map(|(_, p)| *p)
                .collect();
            stats::simpson(&inside, dx) / (total + EPSILON)
        })
        .collect())
}

/// Power in 1–2.5 kHz against 0–750 Hz for the middle third of the signal,
/// both normalized by the magnitude sum of the first third.
///
/// Band edges are converted to bins with a width of `fs / (2·phase)`, half
/// the true FFT resolution, so bin `k` stands for `k·fs / (2·phase)` Hz. The
/// detection model was fitted on features computed this way. A signal with no
/// energy below the low edge yields a non-finite ratio, which the extractor
/// reports as a failure.
pub(crate) fn power_ratio(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let x = signal.samples;
    let phase = x.len() / 3;
    if phase == 0 {
        return Err(DspError::TooShort {
            needed: 3,
            got: x.len(),
        });
    }
    let magnitude = |chunk: &[f64]| -> Vec<f64> { fft(chunk).iter().map(|c| c.norm()).collect() };
    let first = magnitude(&x[..phase]);
    let second = magnitude(&x[phase..2 * phase]);

    let norm = first.iter().sum::<f64>() + EPSILON;
    let second: Vec<f64> = second.iter().map(|v| v / norm).collect();

    let bin_hz = signal.sample_rate / (2.0 * phase as f64 + EPSILON);
    let bin = |hz: f64| ((hz / bin_hz).ceil() as usize).min(phase);
    let (b750, b1k, b2k5) = (bin(750.0), bin(1_000.0), bin(2_500.0));

    let high: f64 = second[b1k..b2k5.max(b1k)].iter().sum();
    let low: f64 = second[..b750].iter().sum();
    Ok(vec![high / low])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
