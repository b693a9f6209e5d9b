//! # Chain DQN
//!
//! Deep Q-learning core for a falling-block colour-matching game. The game
//! engine is external; it supplies steps, per-action feature rows and
//! rewards through the traits in [`engine`].
//!
//! ## Modules
//!
//! - [`engine`]: Step, simulation and feature-model traits; colour permutations
//! - [`ai`]: DQN agent, Q-network pair, exploration, batch assembly
//! - [`training`]: Two-stage replay buffer, trainer, metrics
//! - [`checkpoint`]: Model persistence and versioning
//! - [`device`]: Compute-device selection
//! - [`config`]: TOML configuration loading and validation
//! - [`error`]: Structured error types

#![recursion_limit = "256"]

pub mod ai;
pub mod checkpoint;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod training;
