use std::path::Path;
use std::sync::Arc;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::nn::loss::{HuberLoss, HuberLossConfig, Reduction};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{AdamW, AdamWConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;

use crate::ai::agent::{ReplayEntry, TickOutcome, TrainableAgent};
use crate::ai::batch::BatchAssembler;
use crate::ai::exploration::{argmax_first, ExplorationPolicy, ExplorationSchedule};
use crate::ai::networks::{QNetwork, QNetworkConfig, QNetworkPair};
use crate::checkpoint::{CheckpointMetadata, CheckpointMetrics, DqnTrainingState};
use crate::engine::{FeatureMatrix, FeatureModel, Simulation, Step};
use crate::error::{CheckpointError, ConfigError, TrainingError};
use crate::training::replay_buffer::ReplayBuffer;

/// File stem of the saved policy weights inside a checkpoint directory.
pub const POLICY_FILE: &str = "policy_network";
/// Training counters written next to the weights.
pub const TRAINING_STATE_FILE: &str = "training_state.json";

/// DQN hyperparameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub batch_size: usize,
    pub gamma: f32,
    pub epsilon_start: f32,
    pub epsilon_end: f32,
    /// Steps per e-fold of the exploration rate.
    pub epsilon_decay: f32,
    /// Soft-update rate of the target network.
    pub tau: f32,
    pub learning_rate: f64,
    pub weight_decay: f32,
    /// Every gradient element is clipped to `[-v, v]`.
    pub grad_clip_value: f32,
    pub huber_delta: f32,
    pub replay_capacity: usize,
    pub hidden_size: usize,
    /// Size of the fixed action space (feature rows per step).
    pub action_num: usize,
    pub color_augmentation: bool,
    /// Rows the colour rotation produces per input row.
    pub symmetry_factor: usize,
    /// Ticks between optimization steps.
    pub optimize_interval: usize,
    /// Optimization steps between target soft updates.
    pub target_update_interval: usize,
}

impl Default for DqnConfig {
    fn default() -> Self {
        DqnConfig {
            batch_size: 128,
            gamma: 0.99,
            epsilon_start: 0.9,
            epsilon_end: 0.05,
            epsilon_decay: 1000.0,
            tau: 0.005,
            learning_rate: 1e-4,
            weight_decay: 0.01,
            grad_clip_value: 100.0,
            huber_delta: 1.0,
            replay_capacity: 10_000,
            hidden_size: 300,
            action_num: 22,
            color_augmentation: true,
            symmetry_factor: 24,
            optimize_interval: 1,
            target_update_interval: 1,
        }
    }
}

impl DqnConfig {
    pub fn exploration_schedule(&self) -> ExplorationSchedule {
        ExplorationSchedule::new(self.epsilon_start, self.epsilon_end, self.epsilon_decay)
    }

    pub fn network_config(&self, feature_num: usize) -> QNetworkConfig {
        QNetworkConfig::new(feature_num).with_hidden_size(self.hidden_size)
    }

    /// Validate hyperparameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "dqn.learning_rate must be > 0".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "dqn.batch_size must be > 0".into(),
            ));
        }
        if self.gamma < 0.0 || self.gamma > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.gamma must be in [0, 1]".into(),
            ));
        }
        if self.epsilon_start < 0.0 || self.epsilon_start > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.epsilon_start must be in [0, 1]".into(),
            ));
        }
        if self.epsilon_end < 0.0 || self.epsilon_end > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.epsilon_end must be in [0, 1]".into(),
            ));
        }
        if self.epsilon_end > self.epsilon_start {
            return Err(ConfigError::Validation(
                "dqn.epsilon_end must be <= dqn.epsilon_start".into(),
            ));
        }
        if self.epsilon_decay <= 0.0 {
            return Err(ConfigError::Validation(
                "dqn.epsilon_decay must be > 0".into(),
            ));
        }
        if self.tau <= 0.0 || self.tau > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.tau must be in (0, 1]".into(),
            ));
        }
        if self.weight_decay < 0.0 {
            return Err(ConfigError::Validation(
                "dqn.weight_decay must be >= 0".into(),
            ));
        }
        if self.grad_clip_value <= 0.0 {
            return Err(ConfigError::Validation(
                "dqn.grad_clip_value must be > 0".into(),
            ));
        }
        if self.huber_delta <= 0.0 {
            return Err(ConfigError::Validation(
                "dqn.huber_delta must be > 0".into(),
            ));
        }
        if self.replay_capacity < self.batch_size {
            return Err(ConfigError::Validation(
                "dqn.replay_capacity must be >= dqn.batch_size".into(),
            ));
        }
        if self.hidden_size == 0 {
            return Err(ConfigError::Validation(
                "dqn.hidden_size must be > 0".into(),
            ));
        }
        if self.action_num == 0 {
            return Err(ConfigError::Validation(
                "dqn.action_num must be > 0".into(),
            ));
        }
        if self.color_augmentation && self.symmetry_factor == 0 {
            return Err(ConfigError::Validation(
                "dqn.symmetry_factor must be > 0 when color_augmentation is on".into(),
            ));
        }
        if self.optimize_interval == 0 {
            return Err(ConfigError::Validation(
                "dqn.optimize_interval must be > 0".into(),
            ));
        }
        if self.target_update_interval == 0 {
            return Err(ConfigError::Validation(
                "dqn.target_update_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Deep Q-learning agent: policy and target networks, two-stage replay
/// buffer, epsilon-greedy exploration and an AdamW optimizer.
///
/// Generic over the autodiff backend `B`, the engine's step type `S` and
/// its feature model `M`.
pub struct DqnAgent<B: AutodiffBackend, S: Step, M: FeatureModel<S>> {
    networks: QNetworkPair<B>,
    optimizer: OptimizerAdaptor<AdamW, QNetwork<B>, B>,
    replay_buffer: Arc<ReplayBuffer<S>>,
    exploration: ExplorationPolicy,
    assembler: BatchAssembler,
    loss_fn: HuberLoss,
    model: M,
    config: DqnConfig,
    device: B::Device,
    ticks: u64,
    optimize_steps: u64,
}

impl<B: AutodiffBackend, S: Step, M: FeatureModel<S>> DqnAgent<B, S, M> {
    /// Fresh agent. Fails if `config` does not validate.
    pub fn new(config: DqnConfig, model: M, device: B::Device) -> Result<Self, TrainingError> {
        config.validate()?;
        let networks = QNetworkPair::new(&config.network_config(model.feature_num()), &device);
        Ok(Self::with_networks(config, model, networks, device))
    }

    /// Restore from a checkpoint directory. Policy and target both start
    /// from the saved policy weights; counters are restored when the
    /// training state file is present.
    pub fn from_checkpoint(
        config: DqnConfig,
        model: M,
        dir: &Path,
        device: B::Device,
    ) -> Result<Self, TrainingError> {
        config.validate()?;
        let net_config = config.network_config(model.feature_num());
        let networks = QNetworkPair::load(&net_config, &dir.join(POLICY_FILE), &device)?;
        let mut agent = Self::with_networks(config, model, networks, device);

        let state_path = dir.join(TRAINING_STATE_FILE);
        if state_path.exists() {
            let json = std::fs::read_to_string(&state_path).map_err(|e| {
                CheckpointError::MetadataRead {
                    path: state_path.clone(),
                    source: e,
                }
            })?;
            let state: DqnTrainingState =
                serde_json::from_str(&json).map_err(|e| CheckpointError::MetadataParse {
                    path: state_path,
                    source: e,
                })?;
            agent.restore_training_state(&state);
        }
        tracing::info!(
            dir = %dir.display(),
            steps_done = agent.steps_done(),
            "restored DQN agent from checkpoint"
        );
        Ok(agent)
    }

    fn with_networks(
        config: DqnConfig,
        model: M,
        networks: QNetworkPair<B>,
        device: B::Device,
    ) -> Self {
        let optimizer = AdamWConfig::new()
            .with_weight_decay(config.weight_decay)
            .with_grad_clipping(Some(GradientClippingConfig::Value(config.grad_clip_value)))
            .init();
        let assembler = BatchAssembler::from_config(&config, model.feature_num());

        DqnAgent {
            networks,
            optimizer,
            replay_buffer: Arc::new(ReplayBuffer::new(config.replay_capacity)),
            exploration: ExplorationPolicy::new(config.exploration_schedule()),
            assembler,
            loss_fn: HuberLossConfig::new(config.huber_delta).init(),
            model,
            config,
            device,
            ticks: 0,
            optimize_steps: 0,
        }
    }

    /// Replace the exploration RNG and replay buffer with seeded ones.
    pub fn with_seed(mut self, seed: u64) -> Self {
        use rand::SeedableRng;
        self.exploration = ExplorationPolicy::with_rng(
            self.config.exploration_schedule(),
            rand::rngs::StdRng::seed_from_u64(seed),
        );
        self.replay_buffer = Arc::new(ReplayBuffer::with_seed(self.config.replay_capacity, seed));
        self
    }

    /// Feature rows of every action at `step`, checked against the
    /// configured action space.
    pub fn observe(&self, step: &S) -> Result<FeatureMatrix, TrainingError> {
        let features = self.model.features(step);
        self.check_features(&features)?;
        Ok(features)
    }

    fn check_features(&self, features: &FeatureMatrix) -> Result<(), TrainingError> {
        if features.rows() != self.config.action_num {
            return Err(TrainingError::FeatureShape {
                what: "feature rows per step",
                expected: self.config.action_num,
                actual: features.rows(),
            });
        }
        if features.cols() != self.model.feature_num() {
            return Err(TrainingError::FeatureShape {
                what: "feature row width",
                expected: self.model.feature_num(),
                actual: features.cols(),
            });
        }
        Ok(())
    }

    /// Epsilon-greedy action selection.
    ///
    /// Without an override the exploration counter advances and epsilon
    /// follows the schedule. `Some(0.0)` is fully greedy and `Some(1.0)`
    /// fully random; overrides leave the counter alone.
    pub fn select_action(
        &mut self,
        features: &FeatureMatrix,
        epsilon_override: Option<f32>,
    ) -> Result<usize, TrainingError> {
        self.check_features(features)?;
        match self.exploration.explore(self.config.action_num, epsilon_override) {
            Some(action) => Ok(action),
            None => self.greedy_action(features),
        }
    }

    /// Index of the row the policy network scores highest (first on ties).
    pub fn greedy_action(&self, features: &FeatureMatrix) -> Result<usize, TrainingError> {
        let scores: Vec<f32> = self
            .networks
            .policy
            .valid()
            .forward(features.to_tensor(&self.device))
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| TrainingError::TensorData(format!("{e:?}")))?;
        Ok(argmax_first(&scores))
    }

    pub fn push(&self, entry: ReplayEntry<S>) {
        self.replay_buffer.push(entry);
    }

    /// One gradient step on a sampled batch.
    ///
    /// Returns `Ok(None)` without touching any parameter when the buffer
    /// cannot supply a full batch of finalized entries yet.
    pub fn optimize_step(&mut self) -> Result<Option<f32>, TrainingError> {
        let Some(batch) = self.replay_buffer.sample(self.config.batch_size) else {
            return Ok(None);
        };

        let current_q =
            self.assembler
                .current_q(&self.networks.policy, &self.model, &batch, &self.device)?;
        let target_q = self.assembler.target_q::<B, B::InnerBackend, S, M>(
            self.networks.target(),
            &self.model,
            &batch,
            &self.device,
            &self.device,
        )?;

        let loss = self.loss_fn.forward(current_q, target_q, Reduction::Mean);
        let loss_val: f32 = loss
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| TrainingError::TensorData(format!("{e:?}")))?
            .first()
            .copied()
            .unwrap_or_default();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.networks.policy);
        self.networks.policy =
            self.optimizer
                .step(self.config.learning_rate, self.networks.policy.clone(), grads);
        self.optimize_steps += 1;

        tracing::debug!(
            step = self.optimize_steps,
            loss = loss_val,
            "optimization step"
        );
        Ok(Some(loss_val))
    }

    /// Move the target network toward the policy at rate `tau`.
    pub fn soft_update_target(&mut self) -> Result<(), TrainingError> {
        self.networks.soft_update(self.config.tau)
    }

    /// One decision: observe, select, record, act, then learn on cadence.
    pub fn tick<Sim>(&mut self, sim: &mut Sim) -> Result<TickOutcome, TrainingError>
    where
        Sim: Simulation<Step = S>,
    {
        let step = sim.current_step();
        let features = Arc::new(self.observe(&step)?);
        let action = self.select_action(&features, None)?;
        self.push(ReplayEntry::new(step, features, action));
        sim.apply_action(action);
        self.ticks += 1;

        let mut loss = None;
        let optimize_interval = self.config.optimize_interval.max(1) as u64;
        let update_interval = self.config.target_update_interval.max(1) as u64;
        if self.ticks % optimize_interval == 0 {
            loss = self.optimize_step()?;
            if loss.is_some() && self.optimize_steps % update_interval == 0 {
                self.soft_update_target()?;
            }
        }
        Ok(TickOutcome { action, loss })
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f32 {
        self.exploration.current_epsilon()
    }

    pub fn steps_done(&self) -> u64 {
        self.exploration.steps_done()
    }

    pub fn optimize_steps(&self) -> u64 {
        self.optimize_steps
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Shared handle for pushing entries from another thread.
    pub fn replay_buffer(&self) -> Arc<ReplayBuffer<S>> {
        Arc::clone(&self.replay_buffer)
    }

    pub fn networks(&self) -> &QNetworkPair<B> {
        &self.networks
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    /// Save the policy weights to a directory.
    pub fn save_to_dir(&self, dir: &Path) -> Result<(), CheckpointError> {
        self.networks.save_policy(&dir.join(POLICY_FILE))
    }

    /// Export current training counters for checkpointing.
    pub fn training_state(&self) -> DqnTrainingState {
        DqnTrainingState {
            steps_done: self.steps_done(),
            optimize_steps: self.optimize_steps,
            ticks: self.ticks,
            epsilon: self.epsilon(),
            config: self.config.clone(),
        }
    }

    /// Restore counters from a checkpoint. Hyperparameters stay as
    /// configured for this run.
    pub fn restore_training_state(&mut self, state: &DqnTrainingState) {
        self.exploration.set_steps_done(state.steps_done);
        self.optimize_steps = state.optimize_steps;
        self.ticks = state.ticks;
        if state.config != self.config {
            tracing::warn!("checkpoint hyperparameters differ from the current configuration");
        }
    }
}

impl<B: AutodiffBackend, S: Step, M: FeatureModel<S>> TrainableAgent for DqnAgent<B, S, M> {
    fn algorithm_name(&self) -> &str {
        "DQN"
    }

    fn steps_done(&self) -> u64 {
        self.steps_done()
    }

    fn optimize_steps(&self) -> u64 {
        self.optimize_steps
    }

    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), CheckpointError> {
        self.save_to_dir(dir)
    }

    fn training_state_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.training_state())
    }

    fn build_checkpoint_metadata(
        &self,
        metrics: &CheckpointMetrics,
        tick: u64,
        timestamp: u64,
    ) -> CheckpointMetadata {
        CheckpointMetadata {
            tick,
            timestamp,
            algorithm: self.algorithm_name().to_string(),
            metrics: metrics.clone(),
            hyperparameters: self.config.clone(),
        }
    }
}
