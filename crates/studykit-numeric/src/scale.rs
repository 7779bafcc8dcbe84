use crate::stats::{mean, std_dev};

/// Min-max rescale to [0, 1].
///
/// A zero-range input (all values equal) maps every value to 0.5 rather than
/// dividing by zero.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range == 0.0 {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Z-score standardization. Zero standard deviation maps every value to 0.0.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let m = mean(values);
    let s = std_dev(values);
    if s == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - m) / s).collect()
}

/// Exponential moving average with smoothing factor `alpha` in (0, 1].
pub fn exponential_moving_average(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut ema = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(ema);
    for &v in &values[1..] {
        ema = alpha * v + (1.0 - alpha) * ema;
        out.push(ema);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_bounds() {
        let out = normalize(&[3.0, 9.0, 6.0, 12.0]);
        for v in &out {
            assert!((0.0..=1.0).contains(v));
        }
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[3], 1.0);
    }

    #[test]
    fn test_normalize_constant_input() {
        assert_eq!(normalize(&[4.0, 4.0, 4.0]), vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_standardize_zero_mean() {
        let out = standardize(&[1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(mean(&out), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_constant_input() {
        assert_eq!(standardize(&[7.0, 7.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_ema_converges_toward_signal() {
        let out = exponential_moving_average(&[0.0, 10.0, 10.0, 10.0, 10.0], 0.5);
        assert_eq!(out[0], 0.0);
        assert!(out[4] > 9.0);
    }
}
