use serde::{Deserialize, Serialize};
use studykit_core::{MlError, MlResult};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Pearson correlation coefficient. Returns 0.0 for degenerate input
/// (mismatched lengths, fewer than two points, or zero variance on a side).
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let mx = mean(x);
    let my = mean(y);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

/// One-dimensional least-squares fit: `y = slope * x + intercept`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleRegression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl SimpleRegression {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Closed-form least squares on paired 1-D arrays.
pub fn simple_linear_regression(x: &[f64], y: &[f64]) -> MlResult<SimpleRegression> {
    if x.is_empty() || y.is_empty() {
        return Err(MlError::EmptyInput);
    }
    if x.len() != y.len() {
        return Err(MlError::DimensionMismatch { expected: x.len(), got: y.len() });
    }

    let mx = mean(x);
    let my = mean(y);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        cov += (a - mx) * (b - my);
        var_x += (a - mx) * (a - mx);
    }

    // Constant x: fall back to the horizontal line through the mean.
    let slope = if var_x == 0.0 { 0.0 } else { cov / var_x };
    let intercept = my - slope * mx;

    let ss_tot: f64 = y.iter().map(|v| (v - my) * (v - my)).sum();
    let ss_res: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(a, b)| {
            let e = b - (slope * a + intercept);
            e * e
        })
        .sum();
    let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };

    Ok(SimpleRegression { slope, intercept, r_squared })
}

/// Standard regression-quality metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
}

/// MSE, RMSE, MAE and R² over paired actual/predicted arrays.
///
/// R² is defined as 1.0 when `actual` has zero variance, avoiding a NaN for
/// constant targets.
pub fn regression_metrics(actual: &[f64], predicted: &[f64]) -> MlResult<RegressionMetrics> {
    if actual.is_empty() {
        return Err(MlError::EmptyInput);
    }
    if actual.len() != predicted.len() {
        return Err(MlError::DimensionMismatch { expected: actual.len(), got: predicted.len() });
    }

    let n = actual.len() as f64;
    let mse = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / n;
    let mae = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n;

    let ma = mean(actual);
    let ss_tot: f64 = actual.iter().map(|a| (a - ma) * (a - ma)).sum();
    let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - (mse * n) / ss_tot };

    Ok(RegressionMetrics { mse, rmse: mse.sqrt(), mae, r_squared })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_simple_regression_recovers_line() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 3.0).collect();
        let fit = simple_linear_regression(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.intercept, 3.0, epsilon = 1e-10);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-10);
        assert_relative_eq!(fit.predict(20.0), 43.0, epsilon = 1e-10);
    }

    #[test]
    fn test_simple_regression_rejects_bad_input() {
        assert!(matches!(simple_linear_regression(&[], &[]), Err(MlError::EmptyInput)));
        assert!(matches!(
            simple_linear_regression(&[1.0, 2.0], &[1.0]),
            Err(MlError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(pearson_correlation(&x, &y), 1.0, epsilon = 1e-12);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert_relative_eq!(pearson_correlation(&x, &neg), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_metrics_perfect_prediction() {
        let y = [1.0, 2.0, 3.0];
        let m = regression_metrics(&y, &y).unwrap();
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_relative_eq!(m.r_squared, 1.0);
    }

    #[test]
    fn test_metrics_constant_actual_r2_is_one() {
        let m = regression_metrics(&[5.0, 5.0, 5.0], &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(m.r_squared, 1.0);
        assert!(m.mse > 0.0);
    }
}
