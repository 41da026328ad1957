//! Sample statistics for noisy measurements.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Sample variance with an `n - 1` denominator, `None` below two samples.
pub fn variance(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let m = mean(samples)?;
    let sum_sq: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    Some(sum_sq / (samples.len() - 1) as f64)
}

/// Drop the largest and smallest sample while the variance is above a tenth
/// of the untrimmed variance.
///
/// A pair is only removed while at least four samples remain, so two always
/// survive. Returns the variance of what is left, or `None` when fewer than
/// two samples were given.
pub fn trim_outliers(samples: &mut Vec<f64>) -> Option<f64> {
    let mut var = variance(samples)?;
    let threshold = var / 10.0;

    while var > threshold && samples.len() >= 4 {
        remove_extreme(samples, |a, b| a > b);
        remove_extreme(samples, |a, b| a < b);
        var = variance(samples)?;
    }
    Some(var)
}

fn remove_extreme(samples: &mut Vec<f64>, beats: impl Fn(f64, f64) -> bool) {
    let mut index = 0;
    for (i, &x) in samples.iter().enumerate() {
        if beats(x, samples[index]) {
            index = i;
        }
    }
    samples.remove(index);
}

/// Index of the first maximum.
pub fn argmax(samples: &[f64]) -> Option<usize> {
    first_extreme(samples, |a, b| a > b)
}

/// Index of the first minimum.
pub fn argmin(samples: &[f64]) -> Option<usize> {
    first_extreme(samples, |a, b| a < b)
}

fn first_extreme(samples: &[f64], beats: impl Fn(f64, f64) -> bool) -> Option<usize> {
    if samples.is_empty() {
        return None;
    }
    let mut index = 0;
    for (i, &x) in samples.iter().enumerate().skip(1) {
        if beats(x, samples[index]) {
            index = i;
        }
    }
    Some(index)
}

/// `numerator / denominator`, or 0 when the denominator is zero or the
/// result is not finite.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
