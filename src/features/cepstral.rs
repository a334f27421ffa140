//! MFCC summary statistics.

use crate::dsp::mel::{mfcc, MelParams};
use crate::dsp::stats;
use crate::dsp::DspError;

use super::registry::Signal;

pub(super) const N_MFCC: usize = 13;

pub(super) fn mfcc_names() -> Vec<String> {
    (0..N_MFCC)
        .map(|i| format!("mfcc_mean_{i}"))
        .chain((0..N_MFCC).map(|i| format!("mfcc_std_{i}")))
        .collect()
}

/// Per-coefficient mean over frames, then per-coefficient standard
/// deviation.
pub(crate) fn mfcc_summary(signal: &Signal<'_>) -> Result<Vec<f64>, DspError> {
    let frames = mfcc(signal.samples, signal.sample_rate, N_MFCC, MelParams::default())?;
    if frames.is_empty() {
        return Err(DspError::Empty);
    }

    let columns: Vec<Vec<f64>> = (0..N_MFCC)
        .map(|c| frames.iter().map(|frame| frame[c]).collect())
        .collect();

    Ok(columns
        .iter()
        .map(|col| stats::mean(col))
        .chain(columns.iter().map(|col| stats::std_dev(col)))
        .collect())
}
