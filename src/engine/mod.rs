//! Interfaces to the game simulator. The simulator itself (field rules,
//! chain resolution, scoring) lives outside this crate; the training core
//! only sees opaque steps, per-action feature rows and a reward.

mod features;
mod step;
mod symmetry;

#[cfg(test)]
pub(crate) mod testing;

pub use features::{FeatureMatrix, FeatureModel};
pub use step::{Simulation, Step};
pub use symmetry::ColorPermutations;
