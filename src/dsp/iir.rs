//! IIR filter design and zero-phase filtering.
//!
//! Filters are designed the classical way: an analog prototype (Butterworth
//! or Chebyshev type I) in zero/pole/gain form, frequency-warped to the
//! requested band, mapped to the z-plane with the bilinear transform and
//! finally expanded into transfer-function coefficients `(b, a)`.
//!
//! Critical frequencies are expressed as a fraction of Nyquist, so
//! `wn = 0.5` at 12 kHz means 3 kHz.
//!
//! ```rust
//! use cough_screen::dsp::iir::{filtfilt, Iir};
//!
//! let lowpass = Iir::butterworth_lowpass(4, 0.25).unwrap();
//! let x: Vec<f64> = (0..256).map(|i| (i as f64 * 0.05).sin()).collect();
//! let y = filtfilt(&lowpass, &x).unwrap();
//! assert_eq!(y.len(), x.len());
//! ```

use std::f64::consts::PI;

use num_complex::Complex64;

use super::DspError;

/// Sampling frequency implied by Nyquist-normalized critical frequencies.
const NORMALIZED_FS: f64 = 2.0;

// ---------------------------------------------------------------------------
// Iir
// ---------------------------------------------------------------------------

/// Transfer-function coefficients of a digital IIR filter.
///
/// `a[0]` is always `1.0` after design.
#[derive(Debug, Clone, PartialEq)]
pub struct Iir {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

enum Prototype {
    Butterworth,
    ChebyshevI { ripple_db: f64 },
}

impl Iir {
    /// Butterworth low-pass of the given order.
    pub fn butterworth_lowpass(order: usize, wn: f64) -> Result<Self, DspError> {
        lowpass(order, wn, Prototype::Butterworth)
    }

    /// Chebyshev type I low-pass with `ripple_db` of pass-band ripple.
    pub fn chebyshev1_lowpass(order: usize, ripple_db: f64, wn: f64) -> Result<Self, DspError> {
        if !(ripple_db > 0.0) {
            return Err(DspError::InvalidParameter(format!(
                "pass-band ripple must be positive, got {ripple_db}"
            )));
        }
        lowpass(order, wn, Prototype::ChebyshevI { ripple_db })
    }

    /// Butterworth band-pass between `low` and `high` (both Nyquist-normalized).
    ///
    /// The resulting filter has `2 * order` poles.
    pub fn butterworth_bandpass(order: usize, low: f64, high: f64) -> Result<Self, DspError> {
        check_order(order)?;
        check_wn(low)?;
        check_wn(high)?;
        if low >= high {
            return Err(DspError::InvalidParameter(format!(
                "band edges must be increasing, got [{low}, {high}]"
            )));
        }

        let (zeros, poles, gain) = prototype(order, &Prototype::Butterworth);
        let (w_low, w_high) = (warp(low), warp(high));
        let bw = w_high - w_low;
        let wo = (w_low * w_high).sqrt();

        let degree = poles.len() - zeros.len();
        let scaled_z: Vec<Complex64> = zeros.iter().map(|z| z * (bw / 2.0)).collect();
        let scaled_p: Vec<Complex64> = poles.iter().map(|p| p * (bw / 2.0)).collect();

        let mut bp_z = split_band(&scaled_z, wo);
        bp_z.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));
        let bp_p = split_band(&scaled_p, wo);
        let bp_k = gain * bw.powi(degree as i32);

        Ok(bilinear(bp_z, bp_p, bp_k))
    }

    /// Number of taps (`max(len(a), len(b))`).
    pub fn taps(&self) -> usize {
        self.a.len().max(self.b.len())
    }
}

fn lowpass(order: usize, wn: f64, kind: Prototype) -> Result<Iir, DspError> {
    check_order(order)?;
    check_wn(wn)?;

    let (zeros, poles, gain) = prototype(order, &kind);
    let wo = warp(wn);
    let degree = poles.len() - zeros.len();

    let z: Vec<Complex64> = zeros.iter().map(|z| z * wo).collect();
    let p: Vec<Complex64> = poles.iter().map(|p| p * wo).collect();
    let k = gain * wo.powi(degree as i32);

    Ok(bilinear(z, p, k))
}

fn check_order(order: usize) -> Result<(), DspError> {
    if order == 0 {
        return Err(DspError::InvalidParameter("filter order must be ≥ 1".into()));
    }
    Ok(())
}

fn check_wn(wn: f64) -> Result<(), DspError> {
    if !(wn > 0.0 && wn < 1.0) {
        return Err(DspError::InvalidParameter(format!(
            "critical frequency must lie in (0, 1) of Nyquist, got {wn}"
        )));
    }
    Ok(())
}

/// Pre-warp a normalized digital frequency for the bilinear transform.
fn warp(wn: f64) -> f64 {
    2.0 * NORMALIZED_FS * (PI * wn / NORMALIZED_FS).tan()
}

/// Analog prototype with unit cutoff: `(zeros, poles, gain)`.
fn prototype(order: usize, kind: &Prototype) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let n = order as f64;
    let steps = (0..order).map(|i| -(order as f64 - 1.0) + 2.0 * i as f64);

    match kind {
        Prototype::Butterworth => {
            let poles = steps
                .map(|m| -Complex64::new(0.0, PI * m / (2.0 * n)).exp())
                .collect();
            (Vec::new(), poles, 1.0)
        }
        Prototype::ChebyshevI { ripple_db } => {
            let eps = (10f64.powf(0.1 * ripple_db) - 1.0).sqrt();
            let mu = (1.0 / eps).asinh() / n;
            let poles: Vec<Complex64> = steps
                .map(|m| -Complex64::new(mu, PI * m / (2.0 * n)).sinh())
                .collect();
            let mut gain = poles.iter().fold(Complex64::new(1.0, 0.0), |acc, p| acc * -p).re;
            if order % 2 == 0 {
                gain /= (1.0 + eps * eps).sqrt();
            }
            (Vec::new(), poles, gain)
        }
    }
}

/// Low-pass → band-pass root mapping: each root becomes two.
fn split_band(roots: &[Complex64], wo: f64) -> Vec<Complex64> {
    let wo2 = Complex64::new(wo * wo, 0.0);
    let mut upper = Vec::with_capacity(roots.len() * 2);
    let mut lower = Vec::with_capacity(roots.len());
    for r in roots {
        let disc = (r * r - wo2).sqrt();
        upper.push(r + disc);
        lower.push(r - disc);
    }
    upper.extend(lower);
    upper
}

/// Bilinear transform from the s-plane to the z-plane, then expand to `(b, a)`.
fn bilinear(zeros: Vec<Complex64>, poles: Vec<Complex64>, gain: f64) -> Iir {
    let fs2 = Complex64::new(2.0 * NORMALIZED_FS, 0.0);
    let degree = poles.len() - zeros.len();

    let mut z_z: Vec<Complex64> = zeros.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
    let p_z: Vec<Complex64> = poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();
    z_z.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

    let num = zeros.iter().fold(Complex64::new(1.0, 0.0), |acc, z| acc * (fs2 - z));
    let den = poles.iter().fold(Complex64::new(1.0, 0.0), |acc, p| acc * (fs2 - p));
    let k_z = gain * (num / den).re;

    let b = poly(&z_z).into_iter().map(|c| c.re * k_z).collect();
    let a = poly(&p_z).into_iter().map(|c| c.re).collect();
    Iir { b, a }
}

/// Monic polynomial coefficients (highest power first) with the given roots.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for r in roots {
        let mut next = coeffs.clone();
        next.push(Complex64::new(0.0, 0.0));
        for i in 1..next.len() {
            next[i] -= r * coeffs[i - 1];
        }
        coeffs = next;
    }
    coeffs
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Pad `b` and `a` to the same length and normalize by `a[0]`.
fn normalized(filter: &Iir) -> (Vec<f64>, Vec<f64>) {
    let n = filter.taps();
    let a0 = filter.a[0];
    let mut b: Vec<f64> = filter.b.iter().map(|v| v / a0).collect();
    let mut a: Vec<f64> = filter.a.iter().map(|v| v / a0).collect();
    b.resize(n, 0.0);
    a.resize(n, 0.0);
    (b, a)
}

/// Direct form II transposed filter. `zi` (length `taps - 1`) seeds the
/// delay line; `None` starts from rest.
pub fn lfilter(filter: &Iir, x: &[f64], zi: Option<&[f64]>) -> Vec<f64> {
    let (b, a) = normalized(filter);
    let n = b.len();
    let mut z: Vec<f64> = match zi {
        Some(init) => init.to_vec(),
        None => vec![0.0; n.saturating_sub(1)],
    };

    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = b[0] * xn + z.first().copied().unwrap_or(0.0);
        if n > 1 {
            for i in 0..n - 2 {
                z[i] = b[i + 1] * xn + z[i + 1] - a[i + 1] * yn;
            }
            z[n - 2] = b[n - 1] * xn - a[n - 1] * yn;
        }
        y.push(yn);
    }
    y
}

/// Steady-state initial conditions for a unit step input.
pub fn lfilter_zi(filter: &Iir) -> Result<Vec<f64>, DspError> {
    let (b, a) = normalized(filter);
    let n = b.len();
    if n < 2 {
        return Ok(Vec::new());
    }
    let m = n - 1;

    // I - companion(a)^T
    let mut lhs = vec![vec![0.0; m]; m];
    for (i, row) in lhs.iter_mut().enumerate() {
        row[i] = 1.0;
        row[0] += a[i + 1];
        if i + 1 < m {
            row[i + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();

    solve(lhs, rhs)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut lhs: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>, DspError> {
    let m = rhs.len();
    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&i, &j| lhs[i][col].abs().total_cmp(&lhs[j][col].abs()))
            .unwrap_or(col);
        if lhs[pivot][col].abs() < f64::EPSILON {
            return Err(DspError::Singular);
        }
        lhs.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..m {
            let factor = lhs[row][col] / lhs[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..m {
                lhs[row][k] -= factor * lhs[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut out = vec![0.0; m];
    for row in (0..m).rev() {
        let tail: f64 = (row + 1..m).map(|k| lhs[row][k] * out[k]).sum();
        out[row] = (rhs[row] - tail) / lhs[row][row];
    }
    Ok(out)
}

/// Zero-phase forward-backward filtering.
///
/// The signal is extended at both ends by odd reflection over
/// `3 * taps` samples and both passes start from steady-state initial
/// conditions, which suppresses edge transients.
pub fn filtfilt(filter: &Iir, x: &[f64]) -> Result<Vec<f64>, DspError> {
    let padlen = 3 * filter.taps();
    if x.len() <= padlen {
        return Err(DspError::TooShort {
            needed: padlen + 1,
            got: x.len(),
        });
    }

    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));

    let zi = lfilter_zi(filter)?;

    let seed: Vec<f64> = zi.iter().map(|z| z * ext[0]).collect();
    let mut y = lfilter(filter, &ext, Some(&seed));
    y.reverse();

    let seed: Vec<f64> = zi.iter().map(|z| z * y[0]).collect();
    let mut y = lfilter(filter, &y, Some(&seed));
    y.reverse();

    Ok(y[padlen..padlen + n].to_vec())
}

/// Integer-factor decimation with an 8th-order Chebyshev type I anti-alias
/// filter (0.05 dB ripple, cutoff `0.8 / q`) applied zero-phase.
///
/// `q == 1` returns the input unchanged.
pub fn decimate(x: &[f64], q: usize) -> Result<Vec<f64>, DspError> {
    match q {
        0 => Err(DspError::InvalidParameter("decimation factor must be ≥ 1".into())),
        1 => Ok(x.to_vec()),
        q => {
            let anti_alias = Iir::chebyshev1_lowpass(8, 0.05, 0.8 / q as f64)?;
            let filtered = filtfilt(&anti_alias, x)?;
            Ok(filtered.into_iter().step_by(q).collect())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len(), "length mismatch: {a:?} vs {b:?}");
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} vs {b:?}");
        }
    }

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn butterworth_second_order_half_band() {
        // Reference coefficients for a 2nd-order Butterworth at wn = 0.5.
        let f = Iir::butterworth_lowpass(2, 0.5).unwrap();
        assert_close(&f.b, &[0.292_893_22, 0.585_786_44, 0.292_893_22], 1e-6);
        assert_close(&f.a, &[1.0, 0.0, 0.171_572_88], 1e-6);
    }

    #[test]
    fn butterworth_lowpass_has_unit_dc_gain() {
        let f = Iir::butterworth_lowpass(4, 0.3).unwrap();
        let dc = f.b.iter().sum::<f64>() / f.a.iter().sum::<f64>();
        assert!((dc - 1.0).abs() < 1e-9, "dc gain {dc}");
    }

    #[test]
    fn bandpass_blocks_dc() {
        let f = Iir::butterworth_bandpass(1, 0.2, 0.4).unwrap();
        assert_eq!(f.a.len(), 3);
        let dc = f.b.iter().sum::<f64>();
        assert!(dc.abs() < 1e-12, "dc response {dc}");
    }

    #[test]
    fn chebyshev_even_order_dc_gain_matches_ripple() {
        let f = Iir::chebyshev1_lowpass(8, 0.05, 0.8 / 3.0).unwrap();
        let dc = f.b.iter().sum::<f64>() / f.a.iter().sum::<f64>();
        let expected = 1.0 / (1.0 + (10f64.powf(0.005) - 1.0)).sqrt();
        assert!((dc - expected).abs() < 1e-6, "dc gain {dc}, expected {expected}");
    }

    #[test]
    fn invalid_critical_frequency_rejected() {
        assert!(Iir::butterworth_lowpass(4, 1.0).is_err());
        assert!(Iir::butterworth_lowpass(4, 0.0).is_err());
        assert!(Iir::butterworth_bandpass(1, 0.4, 0.2).is_err());
        assert!(Iir::butterworth_lowpass(0, 0.5).is_err());
    }

    #[test]
    fn lfilter_zi_gives_step_steady_state() {
        let f = Iir::butterworth_lowpass(3, 0.2).unwrap();
        let zi = lfilter_zi(&f).unwrap();
        let y = lfilter(&f, &[1.0; 16], Some(&zi));
        for v in y {
            assert!((v - 1.0).abs() < 1e-9, "step response drifted: {v}");
        }
    }

    #[test]
    fn filtfilt_preserves_constant_signal() {
        let f = Iir::butterworth_lowpass(4, 0.25).unwrap();
        let y = filtfilt(&f, &[0.5; 200]).unwrap();
        for v in y {
            assert!((v - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn filtfilt_attenuates_stopband_and_keeps_passband() {
        let fs = 1000.0;
        let f = Iir::butterworth_lowpass(4, 50.0 / (fs / 2.0)).unwrap();

        let pass = filtfilt(&f, &sine(5.0, fs, 2000)).unwrap();
        let stop = filtfilt(&f, &sine(300.0, fs, 2000)).unwrap();

        assert!((rms(&pass[200..1800]) - rms(&sine(5.0, fs, 2000)[200..1800])).abs() < 0.01);
        assert!(rms(&stop[200..1800]) < 1e-3);
    }

    #[test]
    fn filtfilt_rejects_short_input() {
        let f = Iir::butterworth_lowpass(4, 0.25).unwrap();
        let err = filtfilt(&f, &[1.0; 10]).unwrap_err();
        assert!(matches!(err, DspError::TooShort { needed: 16, got: 10 }), "{err}");
    }

    #[test]
    fn decimate_output_length_is_ceiling() {
        let x = vec![0.0; 1000];
        assert_eq!(decimate(&x, 3).unwrap().len(), 334);
        assert_eq!(decimate(&x, 4).unwrap().len(), 250);
        assert_eq!(decimate(&x, 1).unwrap().len(), 1000);
        assert!(decimate(&x, 0).is_err());
    }
}
