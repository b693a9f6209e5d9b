//! Training infrastructure: replay memory, the tick-driven trainer and
//! rolling metrics.

pub mod metrics;
pub mod replay_buffer;
pub mod trainer;

pub use metrics::TrainingMetrics;
pub use replay_buffer::ReplayBuffer;
pub use trainer::{Trainer, TrainerConfig};
