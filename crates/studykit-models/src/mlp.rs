use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use studykit_core::{MlError, MlResult, MultiDataset};
use studykit_numeric::{regression_metrics, Activation, RegressionMetrics};

use crate::persist::ModelBlob;

const BLOB_KIND: &str = "multi_layer_perceptron";

const EPOCHS: usize = 100;
const LEARNING_RATE: f64 = 0.01;
const LOG_EVERY: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    /// Row-major [out][in].
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
    activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.biases.iter())
            .map(|(row, &b)| {
                let z: f64 = row.iter().zip(input.iter()).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Feed-forward stack of dense layers with Xavier-uniform seeded init.
///
/// Training runs a fixed 100 epochs at learning rate 0.01 and applies
/// gradient updates to the output layer only: the hidden stack stays at its
/// random initialization, acting as a fixed nonlinear projection with a
/// trained linear readout on top. Full backpropagation is deliberately not
/// implemented.
#[derive(Debug, Clone)]
pub struct MultiLayerPerceptron {
    layer_sizes: Vec<usize>,
    layers: Vec<DenseLayer>,
    trained: bool,
}

impl MultiLayerPerceptron {
    /// `layer_sizes` is [input, hidden.., output]; one activation per layer
    /// transition.
    pub fn new(
        layer_sizes: &[usize],
        activations: &[Activation],
        seed: Option<u64>,
    ) -> MlResult<Self> {
        if layer_sizes.len() < 2 {
            return Err(MlError::InvalidOperation(
                "architecture needs at least input and output layers".into(),
            ));
        }
        if layer_sizes.iter().any(|&s| s == 0) {
            return Err(MlError::InvalidOperation("layer sizes must be positive".into()));
        }
        if activations.len() != layer_sizes.len() - 1 {
            return Err(MlError::DimensionMismatch {
                expected: layer_sizes.len() - 1,
                got: activations.len(),
            });
        }

        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let mut layers = Vec::with_capacity(layer_sizes.len() - 1);
        for (idx, pair) in layer_sizes.windows(2).enumerate() {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let scale = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let weights: Vec<Vec<f64>> = (0..fan_out)
                .map(|_| (0..fan_in).map(|_| rng.gen_range(-scale..scale)).collect())
                .collect();
            layers.push(DenseLayer {
                weights,
                biases: vec![0.0; fan_out],
                activation: activations[idx],
            });
        }

        Ok(MultiLayerPerceptron {
            layer_sizes: layer_sizes.to_vec(),
            layers,
            trained: false,
        })
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn n_inputs(&self) -> usize {
        self.layer_sizes[0]
    }

    pub fn n_outputs(&self) -> usize {
        *self.layer_sizes.last().unwrap()
    }

    /// Forward pass keeping every layer's output (training needs the
    /// penultimate activation).
    fn forward_all(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut outputs = Vec::with_capacity(self.layers.len());
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current);
            outputs.push(current.clone());
        }
        outputs
    }

    pub fn fit(&mut self, data: &MultiDataset) -> MlResult<()> {
        if data.n_features() != self.n_inputs() {
            return Err(MlError::DimensionMismatch {
                expected: self.n_inputs(),
                got: data.n_features(),
            });
        }
        if data.n_outputs() != self.n_outputs() {
            return Err(MlError::DimensionMismatch {
                expected: self.n_outputs(),
                got: data.n_outputs(),
            });
        }

        let n = data.len() as f64;
        for epoch in 0..EPOCHS {
            let mut loss = 0.0;

            for (input, target) in data.features().iter().zip(data.targets().iter()) {
                let outputs = self.forward_all(input);
                let prediction = outputs.last().unwrap();

                // Input to the output layer.
                let penultimate: &[f64] = if outputs.len() >= 2 {
                    &outputs[outputs.len() - 2]
                } else {
                    input
                };

                let last = self.layers.last_mut().unwrap();
                for j in 0..prediction.len() {
                    let err = prediction[j] - target[j];
                    loss += err * err;

                    let delta =
                        err * last.activation.derivative_from_output(prediction[j]);
                    for (i, &x) in penultimate.iter().enumerate() {
                        last.weights[j][i] -= LEARNING_RATE * delta * x;
                    }
                    last.biases[j] -= LEARNING_RATE * delta;
                }
            }

            if epoch % LOG_EVERY == 0 {
                tracing::debug!(epoch, loss = loss / n, "mlp training");
            }
        }

        self.trained = true;
        Ok(())
    }

    pub fn predict(&self, features: &[f64]) -> MlResult<Vec<f64>> {
        if !self.trained {
            return Err(MlError::ModelNotTrained);
        }
        if features.len() != self.n_inputs() {
            return Err(MlError::DimensionMismatch {
                expected: self.n_inputs(),
                got: features.len(),
            });
        }
        Ok(self.forward_all(features).pop().unwrap())
    }

    /// Metrics over all outputs, flattened.
    pub fn evaluate(&self, data: &MultiDataset) -> MlResult<RegressionMetrics> {
        let mut actual = Vec::with_capacity(data.len() * data.n_outputs());
        let mut predicted = Vec::with_capacity(data.len() * data.n_outputs());
        for (input, target) in data.features().iter().zip(data.targets().iter()) {
            predicted.extend(self.predict(input)?);
            actual.extend_from_slice(target);
        }
        regression_metrics(&actual, &predicted)
    }

    pub fn save(&self) -> MlResult<String> {
        if !self.trained {
            return Err(MlError::ModelNotTrained);
        }
        #[derive(Serialize)]
        struct Persisted<'a> {
            layer_sizes: &'a [usize],
            layers: &'a [DenseLayer],
        }
        ModelBlob::wrap(
            BLOB_KIND,
            &Persisted { layer_sizes: &self.layer_sizes, layers: &self.layers },
        )
    }

    pub fn load(blob: &str) -> MlResult<Self> {
        #[derive(Deserialize)]
        struct Persisted {
            layer_sizes: Vec<usize>,
            layers: Vec<DenseLayer>,
        }
        let p: Persisted = ModelBlob::unwrap_state(blob, BLOB_KIND)?;
        Ok(MultiLayerPerceptron {
            layer_sizes: p.layer_sizes,
            layers: p.layers,
            trained: true,
        })
    }
}
