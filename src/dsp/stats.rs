//! Descriptive statistics and numerical integration.

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population standard deviation.
pub fn std_dev(x: &[f64]) -> f64 {
    let mu = mean(x);
    mean(&x.iter().map(|v| (v - mu) * (v - mu)).collect::<Vec<_>>()).sqrt()
}

/// Root mean square.
pub fn rms(x: &[f64]) -> f64 {
    mean(&x.iter().map(|v| v * v).collect::<Vec<_>>()).sqrt()
}

/// Largest absolute value.
pub fn peak(x: &[f64]) -> f64 {
    x.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Percentile `q ∈ [0, 100]` with linear interpolation between order
/// statistics. `None` for an empty slice.
pub fn percentile(x: &[f64], q: f64) -> Option<f64> {
    if x.is_empty() {
        return None;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sample skewness with the small-sample bias correction
/// (adjusted Fisher–Pearson). `None` when fewer than three values; `0.0`
/// for a constant series.
pub fn skewness(x: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 3 {
        return None;
    }
    let mu = mean(x);
    let m2 = x.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n as f64;
    let m3 = x.iter().map(|v| (v - mu).powi(3)).sum::<f64>() / n as f64;
    if m2 <= f64::EPSILON * mu.abs().max(1.0) {
        return Some(0.0);
    }
    let n = n as f64;
    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5))
}

/// Composite Simpson integration of evenly spaced samples.
///
/// With an even number of samples (odd interval count) the last interval
/// is handled by averaging the two possible Simpson + trapezoid splits.
pub fn simpson(y: &[f64], dx: f64) -> f64 {
    match y.len() {
        0 | 1 => 0.0,
        2 => 0.5 * dx * (y[0] + y[1]),
        n if n % 2 == 1 => simpson_odd(y, dx),
        n => {
            let first = simpson_odd(&y[..n - 1], dx) + 0.5 * dx * (y[n - 2] + y[n - 1]);
            let last = 0.5 * dx * (y[0] + y[1]) + simpson_odd(&y[1..], dx);
            0.5 * (first + last)
        }
    }
}

fn simpson_odd(y: &[f64], dx: f64) -> f64 {
    if y.len() < 3 {
        return simpson(y, dx);
    }
    let last = y.len() - 1;
    let inner: f64 = y[1..last]
        .iter()
        .enumerate()
        .map(|(i, v)| if i % 2 == 0 { 4.0 * v } else { 2.0 * v })
        .sum();
    dx / 3.0 * (y[0] + inner + y[last])
}
