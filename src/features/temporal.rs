//! Time-domain families: envelope peaks, zero crossings, energy, crest
//! factor, length and spread.

use crate::dsp::iir::{filtfilt, Iir};
use crate::dsp::peaks::local_maxima;
use crate::dsp::stats;
use crate::dsp::DspError;

use super::registry::Signal;
use super::EPSILON;

const EEPD_FIRST_HZ: usize = 50;
const EEPD_LAST_HZ: usize = 1000;
const EEPD_STEP_HZ: usize = 50;
pub(super) const EEPD_BANDS: usize = (EEPD_LAST_HZ - EEPD_FIRST_HZ) / EEPD_STEP_HZ;
const ENVELOPE_CUTOFF_HZ: f64 = 10.0;

fn eepd_lows() -> impl Iterator<Item = usize> {
    (EEPD_FIRST_HZ..EEPD_LAST_HZ).step_by(EEPD_STEP_HZ)
}

pub(super) fn eepd_names() -> Vec<String> {
    eepd_lows()
        .map(|lo| format!("eepd_{lo}_{}", lo + EEPD_STEP_HZ))
        .collect()
}

/// Envelope energy peak count per 50 Hz band between 50 and 1000 Hz.
///
/// Each band is isolated with a first-order band-pass, squared, smoothed by
/// a 10 Hz second-order low-pass and scaled to its own maximum before the
/// local maxima are counted.
pub(crate) fn envelope_energy_peaks(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let nyquist = signal.sample_rate / 2.0;
    let smoother = Iir::butterworth_lowpass(2, ENVELOPE_CUTOFF_HZ / nyquist)?;

    eepd_lows()
        .map(|lo| {
            let band = Iir::butterworth_bandpass(
                1,
                lo as f64 / nyquist,
                (lo + EEPD_STEP_HZ) as f64 / nyquist,
            )?;
            let energy: Vec<f64> = filtfilt(&band, signal.samples)?
                .into_iter()
                .map(|v| v * v)
                .collect();
            let mut envelope = filtfilt(&smoother, &energy)?;
            let top = envelope.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)) + EPSILON;
            envelope.iter_mut().for_each(|v| *v /= top);
            Ok(local_maxima(&envelope).len() as f64)
        })
        .collect()
}

pub(crate) fn zero_crossing_rate(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let x = signal.samples;
    if x.len() < 2 {
        return Err(DspError::TooShort {
            needed: 2,
            got: x.len(),
        });
    }
    let crossings = x.windows(2).filter(|w| w[0] * w[1] < 0.0).count();
    Ok(vec![crossings as f64 / (x.len() - 1) as f64])
}

pub(crate) fn rms_power(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    Ok(vec![stats::rms(signal.samples)])
}

/// Peak amplitude over RMS.
pub(crate) fn crest_factor(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let x = signal.samples;
    Ok(vec![stats::peak(x) / (stats::rms(x) + EPSILON)])
}

/// Duration in seconds.
pub(crate) fn signal_length(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    Ok(vec![signal.samples.len() as f64 / signal.sample_rate])
}

pub(crate) fn std_dev(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    Ok(vec![stats::std_dev(signal.samples)])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
