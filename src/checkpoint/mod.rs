//! On-disk checkpoints: policy weights, training counters and metadata.

mod manager;
mod metadata;

pub use manager::{CheckpointData, CheckpointManager, CheckpointManagerConfig};
pub use metadata::{CheckpointMetadata, CheckpointMetrics, DqnTrainingState};
