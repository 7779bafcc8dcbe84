use serde::{Deserialize, Serialize};
use studykit_core::{Dataset, MlError, MlResult};

use crate::persist::ModelBlob;
use crate::SupervisedModel;

const BLOB_KIND: &str = "decision_tree_regressor";

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        value: f64,
    },
}

/// CART-style regression tree, greedy variance-reduction splitting.
///
/// Every midpoint between sorted adjacent unique values is tried per feature
/// (O(features × samples²) per node). Leaves predict the mean of their target
/// subset. `max_depth = 0` yields a single leaf: the global target mean.
#[derive(Debug, Clone)]
pub struct DecisionTreeRegressor {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    root: Option<TreeNode>,
    n_features: usize,
}

impl DecisionTreeRegressor {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        DecisionTreeRegressor {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            min_samples_leaf: 1,
            root: None,
            n_features: 0,
        }
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf.max(1);
        self
    }

    pub fn is_trained(&self) -> bool {
        self.root.is_some()
    }

    pub fn save(&self) -> MlResult<String> {
        let root = self.root.as_ref().ok_or(MlError::ModelNotTrained)?;
        #[derive(Serialize)]
        struct Persisted<'a> {
            max_depth: usize,
            min_samples_split: usize,
            min_samples_leaf: usize,
            n_features: usize,
            root: &'a TreeNode,
        }
        ModelBlob::wrap(
            BLOB_KIND,
            &Persisted {
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                n_features: self.n_features,
                root,
            },
        )
    }

    pub fn load(blob: &str) -> MlResult<Self> {
        #[derive(Deserialize)]
        struct Persisted {
            max_depth: usize,
            min_samples_split: usize,
            min_samples_leaf: usize,
            n_features: usize,
            root: TreeNode,
        }
        let p: Persisted = ModelBlob::unwrap_state(blob, BLOB_KIND)?;
        Ok(DecisionTreeRegressor {
            max_depth: p.max_depth,
            min_samples_split: p.min_samples_split,
            min_samples_leaf: p.min_samples_leaf,
            root: Some(p.root),
            n_features: p.n_features,
        })
    }

    fn build(&self, data: &Dataset, indices: &[usize], depth: usize) -> TreeNode {
        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || indices.len() < 2
        {
            return TreeNode::Leaf { value: mean_target(data, indices) };
        }

        let parent_var = variance_target(data, indices);
        if parent_var == 0.0 {
            return TreeNode::Leaf { value: mean_target(data, indices) };
        }

        let mut best_reduction = 0.0;
        let mut best: Option<(usize, f64, Vec<usize>, Vec<usize>)> = None;

        for feature in 0..data.n_features() {
            let mut values: Vec<f64> =
                indices.iter().map(|&i| data.features()[i][feature]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for pair in values.windows(2) {
                let threshold = (pair[0] + pair[1]) / 2.0;

                let mut left = Vec::new();
                let mut right = Vec::new();
                for &i in indices {
                    if data.features()[i][feature] <= threshold {
                        left.push(i);
                    } else {
                        right.push(i);
                    }
                }
                if left.len() < self.min_samples_leaf || right.len() < self.min_samples_leaf {
                    continue;
                }

                let n = indices.len() as f64;
                let weighted = variance_target(data, &left) * left.len() as f64 / n
                    + variance_target(data, &right) * right.len() as f64 / n;
                let reduction = parent_var - weighted;

                if reduction > best_reduction {
                    best_reduction = reduction;
                    best = Some((feature, threshold, left, right));
                }
            }
        }

        match best {
            Some((feature_idx, threshold, left, right)) => TreeNode::Split {
                feature_idx,
                threshold,
                left: Box::new(self.build(data, &left, depth + 1)),
                right: Box::new(self.build(data, &right, depth + 1)),
            },
            None => TreeNode::Leaf { value: mean_target(data, indices) },
        }
    }

    fn traverse(node: &TreeNode, features: &[f64]) -> f64 {
        match node {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split { feature_idx, threshold, left, right } => {
                if features[*feature_idx] <= *threshold {
                    Self::traverse(left, features)
                } else {
                    Self::traverse(right, features)
                }
            }
        }
    }
}

impl SupervisedModel for DecisionTreeRegressor {
    fn fit(&mut self, data: &Dataset) -> MlResult<()> {
        if data.n_features() == 0 {
            return Err(MlError::EmptyInput);
        }
        let indices: Vec<usize> = (0..data.len()).collect();
        self.n_features = data.n_features();
        self.root = Some(self.build(data, &indices, 0));
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> MlResult<f64> {
        let root = self.root.as_ref().ok_or(MlError::ModelNotTrained)?;
        if features.len() != self.n_features {
            return Err(MlError::DimensionMismatch {
                expected: self.n_features,
                got: features.len(),
            });
        }
        Ok(Self::traverse(root, features))
    }
}

fn mean_target(data: &Dataset, indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| data.targets()[i]).sum::<f64>() / indices.len() as f64
}

fn variance_target(data: &Dataset, indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let m = mean_target(data, indices);
    indices
        .iter()
        .map(|&i| {
            let d = data.targets()[i] - m;
            d * d
        })
        .sum::<f64>()
        / indices.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn step_dataset() -> Dataset {
        // Step function: y = 0 below x = 4, y = 10 above.
        let features: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let targets = vec![0.0, 0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0];
        Dataset::new(features, targets).unwrap()
    }

    #[test]
    fn test_learns_step_function() {
        let mut tree = DecisionTreeRegressor::new(4, 2);
        tree.fit(&step_dataset()).unwrap();
        assert_relative_eq!(tree.predict(&[1.0]).unwrap(), 0.0);
        assert_relative_eq!(tree.predict(&[6.0]).unwrap(), 10.0);
    }

    #[test]
    fn test_depth_zero_predicts_global_mean() {
        let mut tree = DecisionTreeRegressor::new(0, 2);
        tree.fit(&step_dataset()).unwrap();
        for x in [0.0, 3.0, 7.0, 100.0] {
            assert_relative_eq!(tree.predict(&[x]).unwrap(), 5.0);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTreeRegressor::new(3, 2);
        assert!(matches!(tree.predict(&[1.0]), Err(MlError::ModelNotTrained)));
    }

    #[test]
    fn test_constant_targets_collapse_to_leaf() {
        let features: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let ds = Dataset::new(features, vec![3.0; 6]).unwrap();
        let mut tree = DecisionTreeRegressor::new(5, 2);
        tree.fit(&ds).unwrap();
        assert_relative_eq!(tree.predict(&[2.5]).unwrap(), 3.0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut tree = DecisionTreeRegressor::new(4, 2);
        tree.fit(&step_dataset()).unwrap();

        let blob = tree.save().unwrap();
        let restored = DecisionTreeRegressor::load(&blob).unwrap();
        for x in [0.5, 3.5, 5.5] {
            assert_relative_eq!(
                tree.predict(&[x]).unwrap(),
                restored.predict(&[x]).unwrap()
            );
        }
    }
}
