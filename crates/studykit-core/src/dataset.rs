use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{MlError, MlResult};

/// Fixed-length numeric encoding of one entity. Every consumer declares one
/// layout and the length is checked at the model boundary.
pub type FeatureVector = Vec<f64>;

/// A supervised dataset with scalar targets: one feature row per target.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Vec<FeatureVector>,
    targets: Vec<f64>,
}

impl Dataset {
    /// Build a dataset, rejecting ragged rows and length mismatches.
    pub fn new(features: Vec<FeatureVector>, targets: Vec<f64>) -> MlResult<Self> {
        if features.is_empty() {
            return Err(MlError::EmptyInput);
        }
        if features.len() != targets.len() {
            return Err(MlError::DimensionMismatch {
                expected: features.len(),
                got: targets.len(),
            });
        }
        let width = features[0].len();
        for row in &features {
            if row.len() != width {
                return Err(MlError::DimensionMismatch {
                    expected: width,
                    got: row.len(),
                });
            }
        }
        Ok(Dataset { features, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn row(&self, idx: usize) -> (&[f64], f64) {
        (&self.features[idx], self.targets[idx])
    }

    /// Select a subset of rows by index. Indices out of range are rejected.
    pub fn subset(&self, indices: &[usize]) -> MlResult<Dataset> {
        let mut features = Vec::with_capacity(indices.len());
        let mut targets = Vec::with_capacity(indices.len());
        for &i in indices {
            if i >= self.len() {
                return Err(MlError::InvalidOperation(format!(
                    "row index {} out of range for dataset of {} rows",
                    i,
                    self.len()
                )));
            }
            features.push(self.features[i].clone());
            targets.push(self.targets[i]);
        }
        Dataset::new(features, targets)
    }
}

/// A supervised dataset with vector targets (multi-output models).
#[derive(Debug, Clone)]
pub struct MultiDataset {
    features: Vec<FeatureVector>,
    targets: Vec<Vec<f64>>,
}

impl MultiDataset {
    pub fn new(features: Vec<FeatureVector>, targets: Vec<Vec<f64>>) -> MlResult<Self> {
        if features.is_empty() {
            return Err(MlError::EmptyInput);
        }
        if features.len() != targets.len() {
            return Err(MlError::DimensionMismatch {
                expected: features.len(),
                got: targets.len(),
            });
        }
        let in_width = features[0].len();
        let out_width = targets[0].len();
        for row in &features {
            if row.len() != in_width {
                return Err(MlError::DimensionMismatch {
                    expected: in_width,
                    got: row.len(),
                });
            }
        }
        for row in &targets {
            if row.len() != out_width {
                return Err(MlError::DimensionMismatch {
                    expected: out_width,
                    got: row.len(),
                });
            }
        }
        Ok(MultiDataset { features, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    pub fn n_outputs(&self) -> usize {
        self.targets.first().map_or(0, Vec::len)
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn targets(&self) -> &[Vec<f64>] {
        &self.targets
    }
}

/// Shuffle and split a dataset into (train, test).
///
/// `test_size` is the test fraction in (0, 1). With a fixed seed the split is
/// deterministic; with `None` a fresh entropy seed is used.
pub fn train_test_split(
    dataset: &Dataset,
    test_size: f64,
    seed: Option<u64>,
) -> MlResult<(Dataset, Dataset)> {
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(MlError::InvalidOperation(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n = dataset.len();
    if n < 2 {
        return Err(MlError::InsufficientData { required: 2, got: n });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    indices.shuffle(&mut rng);

    // At least one row on each side.
    let n_test = ((n as f64 * test_size).round() as usize).clamp(1, n - 1);
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok((dataset.subset(train_idx)?, dataset.subset(test_idx)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(n: usize) -> Dataset {
        let features: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        let targets: Vec<f64> = (0..n).map(|i| i as f64).collect();
        Dataset::new(features, targets).unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Dataset::new(vec![vec![1.0, 2.0], vec![3.0]], vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, MlError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(Dataset::new(vec![], vec![]), Err(MlError::EmptyInput)));
    }

    #[test]
    fn test_split_sizes() {
        let ds = toy(10);
        let (train, test) = train_test_split(&ds, 0.3, Some(7)).unwrap();
        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 3);
    }

    #[test]
    fn test_split_deterministic_for_fixed_seed() {
        let ds = toy(20);
        let (a_train, _) = train_test_split(&ds, 0.25, Some(42)).unwrap();
        let (b_train, _) = train_test_split(&ds, 0.25, Some(42)).unwrap();
        assert_eq!(a_train.targets(), b_train.targets());

        let (c_train, _) = train_test_split(&ds, 0.25, Some(43)).unwrap();
        assert_ne!(a_train.targets(), c_train.targets());
    }
}
