use serde::{Deserialize, Serialize};

use crate::ai::DqnConfig;

/// Metrics snapshot at checkpoint time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetrics {
    pub average_loss: f32,
    pub average_reward: f32,
    pub epsilon: f32,
    pub steps_done: u64,
    pub optimize_steps: u64,
    pub replay_finalized: usize,
}

/// Top-level checkpoint metadata written to metadata.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub tick: u64,
    pub timestamp: u64,
    pub algorithm: String,
    pub metrics: CheckpointMetrics,
    pub hyperparameters: DqnConfig,
}

/// DQN training state written to training_state.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqnTrainingState {
    pub steps_done: u64,
    pub optimize_steps: u64,
    pub ticks: u64,
    pub epsilon: f32,
    #[serde(default)]
    pub config: DqnConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serde() {
        let meta = CheckpointMetadata {
            tick: 5000,
            timestamp: 1_700_000_000,
            algorithm: "DQN".to_string(),
            metrics: CheckpointMetrics {
                average_loss: 0.05,
                average_reward: 1.5,
                epsilon: 0.3,
                steps_done: 5000,
                optimize_steps: 4800,
                replay_finalized: 4900,
            },
            hyperparameters: DqnConfig::default(),
        };

        let json = serde_json::to_string_pretty(&meta).unwrap();
        let back: CheckpointMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tick, 5000);
        assert_eq!(back.algorithm, "DQN");
        assert_eq!(back.metrics, meta.metrics);
        assert_eq!(back.hyperparameters, DqnConfig::default());
    }

    #[test]
    fn test_training_state_without_config_uses_defaults() {
        let json = r#"{
            "steps_done": 120,
            "optimize_steps": 100,
            "ticks": 120,
            "epsilon": 0.8
        }"#;
        let state: DqnTrainingState = serde_json::from_str(json).unwrap();
        assert_eq!(state.steps_done, 120);
        assert_eq!(state.config, DqnConfig::default());
    }
}
