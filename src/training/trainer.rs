use std::collections::VecDeque;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;

use crate::ai::DqnAgent;
use crate::checkpoint::{CheckpointManager, CheckpointManagerConfig, CheckpointMetrics};
use crate::engine::{FeatureModel, Simulation, Step};
use crate::error::TrainingError;
use crate::training::metrics::TrainingMetrics;

/// Trainer configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub log_interval: u64,
    /// Ticks between checkpoints; 0 disables checkpointing.
    pub checkpoint_interval: u64,
    /// Rolling window for loss and reward averages.
    pub metrics_window: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            log_interval: 1000,
            checkpoint_interval: 10_000,
            metrics_window: 1000,
        }
    }
}

/// Drives a [`DqnAgent`] against a simulation: ticks, logging,
/// checkpoints and greedy evaluation.
pub struct Trainer {
    config: TrainerConfig,
    checkpoint_manager: Option<CheckpointManager>,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Trainer {
            config,
            checkpoint_manager: None,
        }
    }

    /// Enable periodic checkpoints.
    pub fn with_checkpoints(mut self, config: CheckpointManagerConfig) -> Self {
        self.checkpoint_manager = Some(CheckpointManager::new(config));
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run `ticks` training ticks.
    ///
    /// Rewards are recorded as the acted-on steps resolve. Checkpoint
    /// failures are logged and training continues.
    pub fn train<B, S, M, Sim>(
        &self,
        agent: &mut DqnAgent<B, S, M>,
        sim: &mut Sim,
        ticks: u64,
    ) -> Result<TrainingMetrics, TrainingError>
    where
        B: AutodiffBackend,
        S: Step,
        M: FeatureModel<S>,
        Sim: Simulation<Step = S>,
    {
        let mut metrics = TrainingMetrics::with_capacity(self.config.metrics_window);
        let mut unresolved: VecDeque<S> = VecDeque::new();
        let end_tick = agent.ticks() + ticks;

        tracing::info!(
            ticks,
            start_tick = agent.ticks(),
            epsilon = agent.epsilon(),
            "starting DQN training"
        );

        for _ in 0..ticks {
            unresolved.push_back(sim.current_step());
            let outcome = agent.tick(sim)?;
            metrics.record_tick();
            if let Some(loss) = outcome.loss {
                metrics.record_update(loss);
            }

            while unresolved.front().is_some_and(|s| s.is_terminal()) {
                if let Some(step) = unresolved.pop_front() {
                    metrics.record_reward(agent.model().reward(&step));
                }
            }
            if unresolved.len() > self.config.metrics_window {
                unresolved.pop_front();
            }

            let tick = agent.ticks();
            if self.config.log_interval > 0 && tick % self.config.log_interval == 0 {
                let window = self.config.log_interval as usize;
                tracing::info!(
                    tick,
                    end_tick,
                    epsilon = agent.epsilon(),
                    loss = metrics.average_loss(window),
                    reward = metrics.average_reward(window),
                    finalized = agent.replay_buffer().finalized_len(),
                    ticks_per_sec = metrics.ticks_per_sec(),
                    "training progress"
                );
                metrics.reset_window();
            }

            if self.config.checkpoint_interval > 0 && tick % self.config.checkpoint_interval == 0 {
                let started = Instant::now();
                self.checkpoint(agent, &metrics, tick);
                metrics.record_overhead(started.elapsed());
            }
        }

        tracing::info!(
            total_ticks = metrics.total_ticks(),
            total_updates = metrics.total_updates(),
            "training complete"
        );
        Ok(metrics)
    }

    fn checkpoint<B, S, M>(&self, agent: &DqnAgent<B, S, M>, metrics: &TrainingMetrics, tick: u64)
    where
        B: AutodiffBackend,
        S: Step,
        M: FeatureModel<S>,
    {
        let Some(manager) = &self.checkpoint_manager else {
            return;
        };
        let window = self.config.metrics_window;
        let ckpt_metrics = CheckpointMetrics {
            average_loss: metrics.average_loss(window),
            average_reward: metrics.average_reward(window),
            epsilon: agent.epsilon(),
            steps_done: agent.steps_done(),
            optimize_steps: agent.optimize_steps(),
            replay_finalized: agent.replay_buffer().finalized_len(),
        };
        if let Err(e) = manager.save_agent_checkpoint(agent, &ckpt_metrics, tick) {
            tracing::warn!(tick, error = %e, "checkpoint failed");
        }
    }

    /// Play `ticks` greedy decisions without recording or learning.
    ///
    /// Returns the average reward over the visited steps that resolved,
    /// or 0 if none did.
    pub fn evaluate<B, S, M, Sim>(
        &self,
        agent: &DqnAgent<B, S, M>,
        sim: &mut Sim,
        ticks: u64,
    ) -> Result<f32, TrainingError>
    where
        B: AutodiffBackend,
        S: Step,
        M: FeatureModel<S>,
        Sim: Simulation<Step = S>,
    {
        let mut visited = Vec::new();
        for _ in 0..ticks {
            let step = sim.current_step();
            let features = agent.observe(&step)?;
            let action = agent.greedy_action(&features)?;
            sim.apply_action(action);
            visited.push(step);
        }

        let rewards: Vec<f32> = visited
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| agent.model().reward(s))
            .collect();
        if rewards.is_empty() {
            tracing::warn!(ticks, "no evaluated step resolved");
            return Ok(0.0);
        }
        let average = rewards.iter().sum::<f32>() / rewards.len() as f32;
        tracing::info!(ticks, resolved = rewards.len(), average_reward = average, "evaluation");
        Ok(average)
    }
}
