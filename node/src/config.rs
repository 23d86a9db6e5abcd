use std::{fs, num::NonZeroUsize, path::Path};

use anyhow::Context;
use machine_learning::TrainingConfig;
use serde::Deserialize;

/// How the workers of a job share their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Every worker runs inside this process around one shared aggregator.
    Local,
    /// Reduce/broadcast rounds with an end of iteration barrier.
    Collective,
    /// A key-value table served by the aggregator, no barrier.
    Kv,
}

/// The description of a whole job, every node of the job reads the same file.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub strategy: Strategy,
    /// Where the aggregator listens, unused by the local strategy.
    #[serde(default = "default_address")]
    pub address: String,
    pub workers: NonZeroUsize,
    pub training: TrainingConfig,
}

fn default_address() -> String {
    "127.0.0.1:8765".to_string()
}

impl NodeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read job file {}", path.display()))?;

        serde_json::from_str(&text)
            .with_context(|| format!("invalid job file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_job() {
        let json = r#"{
            "strategy": "collective",
            "workers": 3,
            "training": {
                "layers": [
                    { "kind": "fully_connected", "num_output": 2, "input_shape": "4" },
                    { "kind": "softmax_loss", "input_shape": "2" }
                ],
                "stepsize": 0.05,
                "batch_size": 8,
                "max_iterations": 10
            }
        }"#;

        let config: NodeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.strategy, Strategy::Collective);
        assert_eq!(config.address, default_address());
        assert_eq!(config.workers.get(), 3);
        assert_eq!(config.training.layers.len(), 2);
    }

    #[test]
    fn unknown_strategy() {
        let json = r#"{ "strategy": "gossip", "workers": 1,
            "training": { "layers": [], "stepsize": 1, "batch_size": 1, "max_iterations": 1 } }"#;

        assert!(serde_json::from_str::<NodeConfig>(json).is_err());
    }
}
