//! Peak detection on 1-D envelopes.

/// Indices of strict local maxima.
///
/// A flat plateau counts as a single peak (reported at its middle sample)
/// when both of its neighbours are lower. The first and last samples are
/// never peaks.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Windows used by [`pick_peaks`], all in frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPicking {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f64,
    pub wait: usize,
}

/// Select onset-like peaks from an envelope.
///
/// Frame `n` is a peak when
/// 1. `x[n] == max(x[n - pre_max .. n + post_max])`,
/// 2. `x[n] >= mean(x[n - pre_avg .. n + post_avg]) + delta`,
/// 3. more than `wait` frames have passed since the previous peak.
///
/// Windows are clipped at the signal edges.
pub fn pick_peaks(x: &[f64], params: PeakPicking) -> Vec<usize> {
    let n = x.len();
    let mut peaks: Vec<usize> = Vec::new();

    for i in 0..n {
        let max_lo = i.saturating_sub(params.pre_max);
        let max_hi = (i + params.post_max).min(n);
        if max_hi <= max_lo {
            continue;
        }
        let local_max = x[max_lo..max_hi].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if x[i] != local_max {
            continue;
        }

        let avg_lo = i.saturating_sub(params.pre_avg);
        let avg_hi = (i + params.post_avg).min(n);
        let window = &x[avg_lo..avg_hi];
        let local_mean = window.iter().sum::<f64>() / window.len().max(1) as f64;
        if x[i] < local_mean + params.delta {
            continue;
        }

        if let Some(&prev) = peaks.last() {
            if i - prev <= params.wait {
                continue;
            }
        }
        peaks.push(i);
    }
    peaks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
