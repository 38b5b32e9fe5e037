//! Small descriptive-statistics helpers.
//!
//! Every function degrades to `0.0` on empty or degenerate input instead of
//! producing NaN, so callers can feed raw score histories straight in.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Least-squares slope of `ys` against `xs`
pub fn linear_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mx = mean(xs);
    let my = mean(ys);
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        numerator += (x - mx) * (y - my);
        denominator += (x - mx).powi(2);
    }
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    let slope = numerator / denominator;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Sample skewness (third standardized moment)
pub fn skewness(values: &[f64]) -> f64 {
    standardized_moment(values, 3)
}

/// Excess kurtosis (fourth standardized moment minus 3)
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    if values.len() < 2 || std_dev(values) == 0.0 {
        return 0.0;
    }
    standardized_moment(values, 4) - 3.0
}

fn standardized_moment(values: &[f64], order: i32) -> f64 {
    let sd = std_dev(values);
    if sd == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let moment = values.iter().map(|v| ((v - m) / sd).powi(order)).sum::<f64>() / values.len() as f64;
    if moment.is_finite() {
        moment
    } else {
        0.0
    }
}

/// First quartile, median and third quartile using linear interpolation
pub fn quartiles(values: &[f64]) -> (f64, f64, f64) {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    sorted.sort_by(f64::total_cmp);
    (
        percentile(&sorted, 0.25),
        percentile(&sorted, 0.5),
        percentile(&sorted, 0.75),
    )
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
