use std::path::Path;

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::record::DefaultRecorder;
use burn::tensor::backend::AutodiffBackend;

use crate::ai::networks::{soft_update, QNetwork, QNetworkConfig};
use crate::error::{CheckpointError, TrainingError};

/// Policy network trained by gradient descent, plus a target network that
/// follows it by exponential averaging.
///
/// The target lives on the inner (non-autodiff) backend and is only ever
/// written by [`QNetworkPair::soft_update`].
#[derive(Debug)]
pub struct QNetworkPair<B: AutodiffBackend> {
    pub policy: QNetwork<B>,
    target: QNetwork<B::InnerBackend>,
}

impl<B: AutodiffBackend> QNetworkPair<B> {
    /// Fresh policy with the target as an exact copy.
    pub fn new(config: &QNetworkConfig, device: &B::Device) -> Self {
        Self::from_policy(config.init(device))
    }

    pub fn from_policy(policy: QNetwork<B>) -> Self {
        let target = policy.valid();
        QNetworkPair { policy, target }
    }

    /// Restore both networks from one saved policy file.
    pub fn load(
        config: &QNetworkConfig,
        path: &Path,
        device: &B::Device,
    ) -> Result<Self, CheckpointError> {
        let recorder = DefaultRecorder::default();
        let policy: QNetwork<B> = config
            .init(device)
            .load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| CheckpointError::ModelLoad(e.to_string()))?;
        Ok(Self::from_policy(policy))
    }

    /// Persist the policy network. The target is never saved on its own.
    pub fn save_policy(&self, path: &Path) -> Result<(), CheckpointError> {
        let recorder = DefaultRecorder::default();
        self.policy
            .clone()
            .valid()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(|e| CheckpointError::ModelSave(e.to_string()))
    }

    pub fn target(&self) -> &QNetwork<B::InnerBackend> {
        &self.target
    }

    /// `target <- tau * policy + (1 - tau) * target`, parameter by parameter.
    pub fn soft_update(&mut self, tau: f32) -> Result<(), TrainingError> {
        let policy = self.policy.valid();
        self.target = soft_update(&policy, self.target.clone(), tau)?;
        Ok(())
    }
}
