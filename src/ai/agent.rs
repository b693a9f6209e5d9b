use std::path::Path;
use std::sync::Arc;

use crate::checkpoint::{CheckpointMetadata, CheckpointMetrics};
use crate::engine::{FeatureMatrix, Step};
use crate::error::{CheckpointError, TrainingError};

/// One recorded decision: the step acted on, the feature rows of every
/// candidate action, and the index actually taken.
#[derive(Debug, Clone)]
pub struct ReplayEntry<S: Step> {
    pub step: S,
    pub features: Arc<FeatureMatrix>,
    pub action: usize,
}

impl<S: Step> ReplayEntry<S> {
    pub fn new(step: S, features: Arc<FeatureMatrix>, action: usize) -> Self {
        ReplayEntry {
            step,
            features,
            action,
        }
    }

    /// Feature row of the action taken. Fails if `action` is not a row of
    /// the recorded matrix.
    pub fn taken_row(&self) -> Result<&[f32], TrainingError> {
        self.features
            .get_row(self.action)
            .ok_or(TrainingError::FeatureShape {
                what: "taken action index out of range for rows",
                expected: self.features.rows(),
                actual: self.action,
            })
    }
}

/// Result of one orchestrator tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub action: usize,
    /// Loss of the optimization step run this tick, if any.
    pub loss: Option<f32>,
}

/// Interface the checkpoint manager needs from an agent.
pub trait TrainableAgent {
    /// Algorithm name recorded in checkpoint metadata.
    fn algorithm_name(&self) -> &str;
    /// Exploration steps taken so far.
    fn steps_done(&self) -> u64;
    /// Optimization steps applied so far.
    fn optimize_steps(&self) -> u64;
    /// Save network weights to a directory.
    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), CheckpointError>;
    /// Serialize training state to JSON.
    fn training_state_json(&self) -> Result<String, serde_json::Error>;
    /// Build checkpoint metadata for this agent.
    fn build_checkpoint_metadata(
        &self,
        metrics: &CheckpointMetrics,
        tick: u64,
        timestamp: u64,
    ) -> CheckpointMetadata;
}
