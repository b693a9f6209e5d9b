mod dqn;

pub use dqn::{DqnAgent, DqnConfig, POLICY_FILE, TRAINING_STATE_FILE};
