use serde::{Deserialize, Serialize};

/// Element-wise activation functions used by the perceptron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Sigmoid,
    Linear,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Linear => x,
        }
    }

    /// Derivative expressed in terms of the activation output `y`.
    pub fn derivative_from_output(self, y: f64) -> f64 {
        match self {
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Linear => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_relu() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu.apply(3.0), 3.0);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert_relative_eq!(Activation::Sigmoid.apply(0.0), 0.5);
        assert_relative_eq!(
            Activation::Sigmoid.derivative_from_output(0.5),
            0.25
        );
    }

    #[test]
    fn test_linear_identity() {
        assert_eq!(Activation::Linear.apply(-1.5), -1.5);
        assert_eq!(Activation::Linear.derivative_from_output(9.0), 1.0);
    }
}
