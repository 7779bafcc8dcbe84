pub mod activation;
pub mod cluster;
pub mod distance;
pub mod scale;
pub mod stats;

pub use activation::Activation;
pub use cluster::{k_means, KMeansResult};
pub use distance::{cosine_similarity, euclidean_distance, manhattan_distance};
pub use scale::{exponential_moving_average, normalize, standardize};
pub use stats::{
    mean, pearson_correlation, regression_metrics, simple_linear_regression, std_dev, variance,
    RegressionMetrics, SimpleRegression,
};
