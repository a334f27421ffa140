//! FFT helpers, Welch PSD estimation and short-time Fourier transforms.

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

use super::DspError;

/// Forward FFT of a real signal; returns all `n` complex bins.
pub fn fft(x: &[f64]) -> Vec<Complex<f64>> {
    let mut buffer: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    if buffer.is_empty() {
        return buffer;
    }
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(buffer.len()).process(&mut buffer);
    buffer
}

/// Inverse FFT, normalized by `1/n`.
pub fn ifft(spectrum: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut buffer = spectrum.to_vec();
    if buffer.is_empty() {
        return buffer;
    }
    let n = buffer.len() as f64;
    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(buffer.len()).process(&mut buffer);
    buffer.iter_mut().for_each(|c| *c /= n);
    buffer
}

/// Magnitudes of the non-negative frequency bins (`n/2 + 1` values).
pub fn rfft_magnitude(x: &[f64]) -> Vec<f64> {
    let half = x.len() / 2 + 1;
    fft(x).into_iter().take(half).map(|c| c.norm()).collect()
}

/// Frequencies of the `n/2 + 1` real-FFT bins for an `n`-point transform.
pub fn rfft_frequencies(n: usize, fs: f64) -> Vec<f64> {
    (0..n / 2 + 1).map(|k| k as f64 * fs / n as f64).collect()
}

/// Periodic Hann window (the DFT-even variant used for spectral analysis).
pub fn hann(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

// ---------------------------------------------------------------------------
// Welch
// ---------------------------------------------------------------------------

/// One-sided power spectral density estimate.
#[derive(Debug, Clone)]
pub struct Psd {
    pub frequencies: Vec<f64>,
    pub density: Vec<f64>,
}

impl Psd {
    /// Spacing between adjacent frequency bins.
    pub fn resolution(&self) -> f64 {
        match self.frequencies.as_slice() {
            [f0, f1, ..] => f1 - f0,
            _ => 0.0,
        }
    }
}

/// Welch's averaged periodogram.
///
/// * `segment_len`: samples per segment, capped at the signal length.
/// * `overlap`: overlapping samples; defaults to half a segment.
///
/// Each segment is mean-detrended and Hann-windowed; the result is scaled
/// as a density (`V²/Hz`) and doubled for every bin except DC and, for even
/// segment lengths, Nyquist.
pub fn welch(
    x: &[f64],
    fs: f64,
    segment_len: usize,
    overlap: Option<usize>,
) -> Result<Psd, DspError> {
    if x.is_empty() {
        return Err(DspError::Empty);
    }
    let nperseg = segment_len.min(x.len()).max(1);
    let noverlap = overlap.unwrap_or(nperseg / 2);
    if noverlap >= nperseg {
        return Err(DspError::InvalidParameter(format!(
            "overlap ({noverlap}) must be smaller than the segment length ({nperseg})"
        )));
    }

    let window = hann(nperseg);
    let scale = 1.0 / (fs * window.iter().map(|w| w * w).sum::<f64>());
    let step = nperseg - noverlap;
    let n_segments = (x.len() - noverlap) / step;
    let n_bins = nperseg / 2 + 1;

    let mut planner = FftPlanner::new();
    let plan = planner.plan_fft_forward(nperseg);
    let mut density = vec![0.0; n_bins];
    let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];

    for seg in 0..n_segments {
        let chunk = &x[seg * step..seg * step + nperseg];
        let mean = chunk.iter().sum::<f64>() / nperseg as f64;
        for (slot, (&v, &w)) in buffer.iter_mut().zip(chunk.iter().zip(&window)) {
            *slot = Complex::new((v - mean) * w, 0.0);
        }
        plan.process(&mut buffer);
        for (acc, c) in density.iter_mut().zip(&buffer) {
            *acc += c.norm_sqr() * scale;
        }
    }

    let doubled_end = if nperseg % 2 == 0 { n_bins - 1 } else { n_bins };
    for (k, v) in density.iter_mut().enumerate() {
        *v /= n_segments as f64;
        if k >= 1 && k < doubled_end {
            *v *= 2.0;
        }
    }

    Ok(Psd {
        frequencies: rfft_frequencies(nperseg, fs),
        density,
    })
}

// ---------------------------------------------------------------------------
// STFT
// ---------------------------------------------------------------------------

/// Mirror index into a signal of length `n` (reflection without repeating
/// the edge sample).
fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let j = i.rem_euclid(period);
    if j >= n as isize {
        (period - j) as usize
    } else {
        j as usize
    }
}

/// Centered framing: the signal is reflect-padded by `frame_len / 2` on
/// both sides and cut into frames every `hop` samples.
pub fn centered_frames(x: &[f64], frame_len: usize, hop: usize) -> Result<Vec<Vec<f64>>, DspError> {
    if x.is_empty() {
        return Err(DspError::Empty);
    }
    if frame_len == 0 || hop == 0 {
        return Err(DspError::InvalidParameter(
            "frame length and hop must be non-zero".into(),
        ));
    }
    let pad = (frame_len / 2) as isize;
    let padded: Vec<f64> = (-pad..x.len() as isize + pad)
        .map(|i| x[reflect_index(i, x.len())])
        .collect();

    let n_frames = 1 + (padded.len() - frame_len) / hop;
    Ok((0..n_frames)
        .map(|f| padded[f * hop..f * hop + frame_len].to_vec())
        .collect())
}

/// Short-time magnitude spectrogram, `frames × (n_fft/2 + 1)`, using a
/// periodic Hann window and centered frames.
pub fn stft_magnitude(x: &[f64], n_fft: usize, hop: usize) -> Result<Vec<Vec<f64>>, DspError> {
    let frames = centered_frames(x, n_fft, hop)?;
    let window = hann(n_fft);
    let n_bins = n_fft / 2 + 1;

    let mut planner = FftPlanner::new();
    let plan = planner.plan_fft_forward(n_fft);
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    Ok(frames
        .into_iter()
        .map(|frame| {
            for (slot, (&v, &w)) in buffer.iter_mut().zip(frame.iter().zip(&window)) {
                *slot = Complex::new(v * w, 0.0);
            }
            plan.process(&mut buffer);
            buffer.iter().take(n_bins).map(|c| c.norm()).collect()
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn rfft_magnitude_of_impulse_is_flat() {
        let mut x = vec![0.0; 8];
        x[0] = 1.0;
        let mag = rfft_magnitude(&x);
        assert_eq!(mag.len(), 5);
        for m in mag {
            assert!((m - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ifft_inverts_fft() {
        let x = vec![0.5, -1.0, 2.0, 0.25, 3.0];
        let back = ifft(&fft(&x));
        for (a, b) in x.iter().zip(back) {
            assert!((a - b.re).abs() < 1e-12);
        }
    }

    #[test]
    fn hann_is_periodic() {
        let w = hann(4);
        assert_eq!(w.len(), 4);
        assert!(w[0].abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn welch_peak_sits_at_tone_frequency() {
        let fs = 1000.0;
        let psd = welch(&sine(125.0, fs, 4000), fs, 256, None).unwrap();
        assert_eq!(psd.density.len(), 129);
        let (peak, _) = psd
            .density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((psd.frequencies[peak] - 125.0).abs() <= psd.resolution());
    }

    #[test]
    fn welch_density_integrates_to_variance() {
        // Parseval: the one-sided density integrates to the signal power.
        let fs = 1000.0;
        let x = sine(100.0, fs, 8192);
        let psd = welch(&x, fs, 512, None).unwrap();
        let power: f64 = psd.density.iter().sum::<f64>() * psd.resolution();
        assert!((power - 0.5).abs() < 0.02, "power {power}");
    }

    #[test]
    fn welch_caps_segment_to_signal_length() {
        let psd = welch(&[1.0, 2.0, 3.0, 4.0], 1.0, 256, None).unwrap();
        assert_eq!(psd.frequencies.len(), 3);
    }

    #[test]
    fn welch_rejects_empty() {
        assert!(matches!(welch(&[], 1.0, 256, None), Err(DspError::Empty)));
    }

    #[test]
    fn reflect_padding_mirrors_without_edge_repeat() {
        let frames = centered_frames(&[1.0, 2.0, 3.0, 4.0], 4, 4).unwrap();
        assert_eq!(frames[0], vec![3.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn stft_frame_count() {
        let x = vec![0.0; 22_050];
        let spec = stft_magnitude(&x, 2048, 512).unwrap();
        assert_eq!(spec.len(), 1 + 22_050 / 512);
        assert_eq!(spec[0].len(), 1025);
    }
}
