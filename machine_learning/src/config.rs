//! The training job description shared by every node of a job.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{Result, arch::Network};

/// The description of a single layer.
///
/// Which fields matter depends on `kind`, the rest are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// One of `fully_connected`, `sigmoid`, `tanh`, `relu`, `softmax_loss`,
    /// `sigmoid_loss`, `convolution` or `pooling`.
    pub kind: String,
    /// The output size of a fully connected layer, or the filter count of a convolution.
    #[serde(default)]
    pub num_output: usize,
    #[serde(default)]
    pub kernel: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// `max` or `average`, only read by pooling layers.
    #[serde(default)]
    pub pooling: String,
    /// The seed of the layer's parameter initialization.
    #[serde(default)]
    pub seed: u64,
    /// `HxWxC`, `HxW` or a flat size `N`.
    pub input_shape: String,
}

fn default_stride() -> usize {
    1
}

impl LayerSpec {
    /// Creates a spec with only the type and the input shape set.
    pub fn new(kind: &str, input_shape: &str) -> Self {
        Self {
            kind: kind.to_string(),
            num_output: 0,
            kernel: 0,
            stride: default_stride(),
            pooling: String::new(),
            seed: 0,
            input_shape: input_shape.to_string(),
        }
    }

    pub fn with_output(mut self, num_output: usize) -> Self {
        self.num_output = num_output;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_kernel(mut self, kernel: usize, stride: usize) -> Self {
        self.kernel = kernel;
        self.stride = stride;
        self
    }

    pub fn with_pooling(mut self, pooling: &str) -> Self {
        self.pooling = pooling.to_string();
        self
    }
}

/// The hyperparameters and the topology of a training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub layers: Vec<LayerSpec>,
    /// The learning rate applied to the averaged gradient.
    pub stepsize: f32,
    /// Samples a worker trains between two parameter synchronizations.
    pub batch_size: NonZeroUsize,
    /// Logical iterations over the training partition before the job stops.
    pub max_iterations: NonZeroUsize,
}

impl TrainingConfig {
    /// Builds a freshly initialized network out of the layer specs.
    ///
    /// Every node calling this with the same config gets identical parameters.
    pub fn build_network(&self) -> Result<Network> {
        Network::from_specs(&self.layers, self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_take_defaults() {
        let json = r#"{
            "layers": [
                { "kind": "fully_connected", "num_output": 3, "input_shape": "4", "seed": 7 },
                { "kind": "softmax_loss", "input_shape": "3" }
            ],
            "stepsize": 0.1,
            "batch_size": 2,
            "max_iterations": 5
        }"#;

        let config: TrainingConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.layers[0].stride, 1);
        assert_eq!(config.layers[1].num_output, 0);
        assert_eq!(config.batch_size.get(), 2);

        let network = config.build_network().unwrap();
        assert_eq!(network.len(), 2);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let json = r#"{ "layers": [], "stepsize": 0.1, "batch_size": 0, "max_iterations": 1 }"#;
        assert!(serde_json::from_str::<TrainingConfig>(json).is_err());
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let json = r#"{ "layers": [], "stepsize": 0.1, "batch_size": 1, "max_iterations": 0 }"#;
        assert!(serde_json::from_str::<TrainingConfig>(json).is_err());
    }
}
