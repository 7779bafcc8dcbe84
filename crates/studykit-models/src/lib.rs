pub mod knn;
pub mod linear;
pub mod mlp;
pub mod persist;
pub mod solve;
pub mod tree;

pub use knn::KnnRegressor;
pub use linear::LinearRegression;
pub use mlp::MultiLayerPerceptron;
pub use persist::{ModelBlob, FORMAT_VERSION};
pub use tree::DecisionTreeRegressor;

use studykit_core::{Dataset, MlResult};
use studykit_numeric::{regression_metrics, RegressionMetrics};

/// Common contract for the scalar-output model primitives.
///
/// `predict` before `fit` fails with `MlError::ModelNotTrained` for every
/// implementation.
pub trait SupervisedModel {
    fn fit(&mut self, data: &Dataset) -> MlResult<()>;

    fn predict(&self, features: &[f64]) -> MlResult<f64>;

    fn evaluate(&self, data: &Dataset) -> MlResult<RegressionMetrics> {
        let mut predicted = Vec::with_capacity(data.len());
        for row in data.features() {
            predicted.push(self.predict(row)?);
        }
        regression_metrics(data.targets(), &predicted)
    }
}
