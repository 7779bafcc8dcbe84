use serde::{Deserialize, Serialize};
use studykit_core::{Dataset, MlError, MlResult};

use crate::persist::ModelBlob;
use crate::solve::solve;
use crate::SupervisedModel;

const BLOB_KIND: &str = "linear_regression";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearState {
    weights: Vec<f64>,
    bias: f64,
}

/// Ordinary least squares via the normal equation `w = (XᵀX)⁻¹Xᵀy`, solved by
/// Gaussian elimination with partial pivoting.
///
/// A singular system is retried once with ridge damping (`XᵀX + λI`); if that
/// also fails the fit reports `IllConditionedInput` instead of silently
/// producing garbage weights.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    state: Option<LinearState>,
}

impl LinearRegression {
    pub fn new() -> Self {
        LinearRegression { state: None }
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.weights.as_slice())
    }

    pub fn bias(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.bias)
    }

    pub fn save(&self) -> MlResult<String> {
        let state = self.state.as_ref().ok_or(MlError::ModelNotTrained)?;
        ModelBlob::wrap(BLOB_KIND, state)
    }

    pub fn load(blob: &str) -> MlResult<Self> {
        let state: LinearState = ModelBlob::unwrap_state(blob, BLOB_KIND)?;
        Ok(LinearRegression { state: Some(state) })
    }

    /// Build the (p+1)×(p+1) normal-equation system with an intercept column.
    fn normal_system(data: &Dataset) -> (Vec<Vec<f64>>, Vec<f64>) {
        let n = data.len();
        let p = data.n_features();
        let dim = p + 1;

        let mut xtx = vec![vec![0.0; dim]; dim];
        let mut xty = vec![0.0; dim];

        for i in 0..n {
            let (row, target) = data.row(i);
            // Augmented row: [1, x_0, .., x_{p-1}]
            for a in 0..dim {
                let xa = if a == 0 { 1.0 } else { row[a - 1] };
                xty[a] += xa * target;
                for b in 0..dim {
                    let xb = if b == 0 { 1.0 } else { row[b - 1] };
                    xtx[a][b] += xa * xb;
                }
            }
        }
        (xtx, xty)
    }
}

impl SupervisedModel for LinearRegression {
    fn fit(&mut self, data: &Dataset) -> MlResult<()> {
        let p = data.n_features();
        if p == 0 {
            return Err(MlError::EmptyInput);
        }
        if data.len() <= p {
            return Err(MlError::InsufficientData { required: p + 1, got: data.len() });
        }

        let (xtx, xty) = Self::normal_system(data);

        let solution = match solve(&xtx, &xty) {
            Ok(s) => s,
            Err(MlError::SingularMatrix) => {
                // Ridge retry: damp the diagonal proportionally to its scale.
                let dim = xtx.len();
                let trace: f64 = (0..dim).map(|i| xtx[i][i]).sum();
                let lambda = 1e-8 * trace / dim as f64;
                let mut damped = xtx.clone();
                for (i, row) in damped.iter_mut().enumerate() {
                    row[i] += lambda;
                }
                solve(&damped, &xty).map_err(|_| MlError::IllConditionedInput)?
            }
            Err(e) => return Err(e),
        };

        self.state = Some(LinearState {
            bias: solution[0],
            weights: solution[1..].to_vec(),
        });
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> MlResult<f64> {
        let state = self.state.as_ref().ok_or(MlError::ModelNotTrained)?;
        if features.len() != state.weights.len() {
            return Err(MlError::DimensionMismatch {
                expected: state.weights.len(),
                got: features.len(),
            });
        }
        let dot: f64 = state
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + state.bias)
    }
}
