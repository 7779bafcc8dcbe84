use serde::{Deserialize, Serialize};
use studykit_core::{Dataset, FeatureVector, MlError, MlResult};
use studykit_numeric::euclidean_distance;

use crate::persist::ModelBlob;
use crate::SupervisedModel;

const BLOB_KIND: &str = "knn_regressor";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnnState {
    features: Vec<FeatureVector>,
    targets: Vec<f64>,
}

/// Lazy k-nearest-neighbors regressor.
///
/// `fit` retains the training pairs; `predict` scans every stored point and
/// takes an inverse-distance-weighted mean of the k nearest targets. An
/// exact match (distance zero) returns that point's target verbatim. O(n)
/// per prediction, acceptable for the small in-memory datasets this system
/// handles.
#[derive(Debug, Clone)]
pub struct KnnRegressor {
    pub k: usize,
    state: Option<KnnState>,
}

impl KnnRegressor {
    pub fn new(k: usize) -> Self {
        KnnRegressor { k: k.max(1), state: None }
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn save(&self) -> MlResult<String> {
        let state = self.state.as_ref().ok_or(MlError::ModelNotTrained)?;
        #[derive(Serialize)]
        struct Persisted<'a> {
            k: usize,
            features: &'a [FeatureVector],
            targets: &'a [f64],
        }
        ModelBlob::wrap(
            BLOB_KIND,
            &Persisted { k: self.k, features: &state.features, targets: &state.targets },
        )
    }

    pub fn load(blob: &str) -> MlResult<Self> {
        #[derive(Deserialize)]
        struct Persisted {
            k: usize,
            features: Vec<FeatureVector>,
            targets: Vec<f64>,
        }
        let p: Persisted = ModelBlob::unwrap_state(blob, BLOB_KIND)?;
        Ok(KnnRegressor {
            k: p.k.max(1),
            state: Some(KnnState { features: p.features, targets: p.targets }),
        })
    }
}

impl SupervisedModel for KnnRegressor {
    fn fit(&mut self, data: &Dataset) -> MlResult<()> {
        if data.len() < self.k {
            return Err(MlError::InsufficientData { required: self.k, got: data.len() });
        }
        self.state = Some(KnnState {
            features: data.features().to_vec(),
            targets: data.targets().to_vec(),
        });
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> MlResult<f64> {
        let state = self.state.as_ref().ok_or(MlError::ModelNotTrained)?;
        let width = state.features[0].len();
        if features.len() != width {
            return Err(MlError::DimensionMismatch { expected: width, got: features.len() });
        }

        let mut dists: Vec<(f64, f64)> = state
            .features
            .iter()
            .zip(state.targets.iter())
            .map(|(row, &t)| (euclidean_distance(features, row), t))
            .collect();
        dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let k = self.k.min(dists.len());
        let nearest = &dists[..k];

        // Exact hit dominates: return that target as-is.
        if nearest[0].0 == 0.0 {
            return Ok(nearest[0].1);
        }

        let mut weight_sum = 0.0;
        let mut weighted = 0.0;
        for &(d, t) in nearest {
            let w = 1.0 / (d + 1e-9);
            weight_sum += w;
            weighted += w * t;
        }
        Ok(weighted / weight_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> Dataset {
        let features = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![5.0, 5.0],
            vec![6.0, 5.0],
        ];
        let targets = vec![1.0, 1.2, 0.9, 10.0, 10.5];
        Dataset::new(features, targets).unwrap()
    }

    #[test]
    fn test_exact_training_point_with_k1() {
        let mut knn = KnnRegressor::new(1);
        knn.fit(&grid()).unwrap();
        assert_eq!(knn.predict(&[5.0, 5.0]).unwrap(), 10.0);
        assert_eq!(knn.predict(&[0.0, 0.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_neighborhood_average() {
        let mut knn = KnnRegressor::new(3);
        knn.fit(&grid()).unwrap();
        // Near the low cluster: prediction stays near its targets.
        let pred = knn.predict(&[0.4, 0.4]).unwrap();
        assert!(pred > 0.8 && pred < 1.3, "got {pred}");
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KnnRegressor::new(3);
        assert!(matches!(knn.predict(&[0.0, 0.0]), Err(MlError::ModelNotTrained)));
    }

    #[test]
    fn test_fit_requires_k_rows() {
        let ds = Dataset::new(vec![vec![0.0], vec![1.0]], vec![0.0, 1.0]).unwrap();
        let mut knn = KnnRegressor::new(5);
        assert!(matches!(
            knn.fit(&ds),
            Err(MlError::InsufficientData { required: 5, got: 2 })
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut knn = KnnRegressor::new(2);
        knn.fit(&grid()).unwrap();

        let blob = knn.save().unwrap();
        let restored = KnnRegressor::load(&blob).unwrap();

        let x = [0.7, 0.1];
        assert_relative_eq!(
            knn.predict(&x).unwrap(),
            restored.predict(&x).unwrap(),
            epsilon = 1e-12
        );
    }
}
