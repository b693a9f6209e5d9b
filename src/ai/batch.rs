//! Turns sampled replay entries into the tensors the loss compares:
//! the policy's estimate for the action taken and the bootstrapped target
//! `reward + gamma * max_a target(next_step, a)`.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::ai::networks::QNetwork;
use crate::ai::{DqnConfig, ReplayEntry};
use crate::engine::{FeatureMatrix, FeatureModel, Step};
use crate::error::TrainingError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchAssembler {
    gamma: f32,
    action_num: usize,
    feature_num: usize,
    /// Rows produced per entry by the colour rotation; `None` disables it.
    symmetry_factor: Option<usize>,
}

impl BatchAssembler {
    pub fn new(
        gamma: f32,
        action_num: usize,
        feature_num: usize,
        symmetry_factor: Option<usize>,
    ) -> Self {
        BatchAssembler {
            gamma,
            action_num,
            feature_num,
            symmetry_factor,
        }
    }

    pub fn from_config(config: &DqnConfig, feature_num: usize) -> Self {
        let symmetry = config.color_augmentation.then_some(config.symmetry_factor);
        Self::new(config.gamma, config.action_num, feature_num, symmetry)
    }

    /// Rows in the assembled tensors per replay entry.
    pub fn rows_per_entry(&self) -> usize {
        self.symmetry_factor.unwrap_or(1)
    }

    /// Stack the taken-action rows, expanded under colour symmetry when
    /// enabled. Row `i * k + r` belongs to entry `i`.
    pub fn taken_features<S: Step, M: FeatureModel<S>>(
        &self,
        model: &M,
        batch: &[ReplayEntry<S>],
    ) -> Result<FeatureMatrix, TrainingError> {
        let rows = batch
            .iter()
            .map(ReplayEntry::taken_row)
            .collect::<Result<Vec<_>, _>>()?;
        let stacked = FeatureMatrix::stack(self.feature_num, rows)?;
        if self.symmetry_factor.is_none() {
            return Ok(stacked);
        }

        let rotated = model.color_rotate(&stacked);
        let expected = batch.len() * self.rows_per_entry();
        if rotated.rows() != expected {
            return Err(TrainingError::FeatureShape {
                what: "colour-rotated batch rows",
                expected,
                actual: rotated.rows(),
            });
        }
        Ok(rotated)
    }

    /// Policy estimate for each taken action: `[B * k, 1]`.
    pub fn current_q<B: Backend, S: Step, M: FeatureModel<S>>(
        &self,
        policy: &QNetwork<B>,
        model: &M,
        batch: &[ReplayEntry<S>],
        device: &B::Device,
    ) -> Result<Tensor<B, 2>, TrainingError> {
        let features = self.taken_features(model, batch)?;
        Ok(policy.forward(features.to_tensor(device)))
    }

    /// Bootstrapped target per entry, one value each (not yet expanded).
    ///
    /// The reward and successor features are computed once per entry; the
    /// target network then scores all `A` successor rows of every entry in
    /// one pass and the best row is kept.
    pub fn target_values<B: Backend, S: Step, M: FeatureModel<S>>(
        &self,
        target: &QNetwork<B>,
        model: &M,
        batch: &[ReplayEntry<S>],
        device: &B::Device,
    ) -> Result<Vec<f32>, TrainingError> {
        let mut rewards = Vec::with_capacity(batch.len());
        let mut next_rows = Vec::with_capacity(batch.len() * self.action_num * self.feature_num);
        for entry in batch {
            rewards.push(model.reward(&entry.step));

            let next = model.features(&entry.step.next());
            if next.rows() != self.action_num {
                return Err(TrainingError::FeatureShape {
                    what: "feature rows per step",
                    expected: self.action_num,
                    actual: next.rows(),
                });
            }
            if next.cols() != self.feature_num {
                return Err(TrainingError::FeatureShape {
                    what: "feature row width",
                    expected: self.feature_num,
                    actual: next.cols(),
                });
            }
            next_rows.extend_from_slice(next.as_slice());
        }

        let next_features =
            FeatureMatrix::from_vec(batch.len() * self.action_num, self.feature_num, next_rows)?;
        let next_values: Vec<f32> = target
            .forward(next_features.to_tensor(device))
            .reshape([batch.len(), self.action_num])
            .max_dim(1)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| TrainingError::TensorData(format!("{e:?}")))?;

        Ok(rewards
            .iter()
            .zip(&next_values)
            .map(|(reward, next)| reward + self.gamma * next)
            .collect())
    }

    /// Targets laid out like [`BatchAssembler::current_q`]: `[B * k, 1]`,
    /// each entry's value repeated `k` times. Built from host data, so no
    /// gradient flows into it.
    pub fn target_q<B: Backend, T: Backend, S: Step, M: FeatureModel<S>>(
        &self,
        target: &QNetwork<T>,
        model: &M,
        batch: &[ReplayEntry<S>],
        target_device: &T::Device,
        device: &B::Device,
    ) -> Result<Tensor<B, 2>, TrainingError> {
        let values = self.target_values(target, model, batch, target_device)?;
        let k = self.rows_per_entry();
        let expanded: Vec<f32> = values
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(k))
            .collect();
        Ok(
            Tensor::<B, 1>::from_data(TensorData::from(expanded.as_slice()), device)
                .reshape([batch.len() * k, 1]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::networks::QNetworkConfig;
    use crate::engine::testing::{MockModel, MockStep, TEST_ACTIONS, TEST_FEATURES};
    use burn::backend::NdArray;
    use std::sync::Arc;

    type TestBackend = NdArray<f32>;

    fn batch(model: &MockModel) -> Vec<ReplayEntry<MockStep>> {
        (0..3)
            .map(|id| {
                let step = MockStep::new(id, true);
                let features = Arc::new(model.features(&step));
                ReplayEntry::new(step, features, id as usize % TEST_ACTIONS)
            })
            .collect()
    }

    #[test]
    fn test_taken_features_without_augmentation() {
        let model = MockModel::new();
        let assembler = BatchAssembler::new(0.9, TEST_ACTIONS, TEST_FEATURES, None);
        let entries = batch(&model);

        let m = assembler.taken_features(&model, &entries).unwrap();
        assert_eq!(m.rows(), 3);
        for (i, e) in entries.iter().enumerate() {
            assert_eq!(m.row(i), e.taken_row().unwrap());
        }
    }

    #[test]
    fn test_taken_features_with_augmentation_is_entry_major() {
        let model = MockModel::new();
        let k = model.symmetry_factor();
        let assembler = BatchAssembler::new(0.9, TEST_ACTIONS, TEST_FEATURES, Some(k));
        let entries = batch(&model);

        let m = assembler.taken_features(&model, &entries).unwrap();
        assert_eq!(m.rows(), 3 * k);
        for (i, e) in entries.iter().enumerate() {
            // identity ordering comes first
            assert_eq!(m.row(i * k), e.taken_row().unwrap());
        }
    }

    #[test]
    fn test_wrong_symmetry_factor_is_rejected() {
        let model = MockModel::new();
        let assembler = BatchAssembler::new(0.9, TEST_ACTIONS, TEST_FEATURES, Some(24));
        let err = assembler.taken_features(&model, &batch(&model)).unwrap_err();
        assert!(matches!(err, TrainingError::FeatureShape { expected: 72, actual: 6, .. }));
    }

    #[test]
    fn test_out_of_range_action_is_rejected() {
        let model = MockModel::new();
        let assembler = BatchAssembler::new(0.9, TEST_ACTIONS, TEST_FEATURES, None);
        let step = MockStep::new(0, true);
        let features = Arc::new(model.features(&step));
        let mut entries = batch(&model);
        entries.push(ReplayEntry::new(step, features, 99));

        let err = assembler.taken_features(&model, &entries).unwrap_err();
        assert!(matches!(
            err,
            TrainingError::FeatureShape {
                expected: TEST_ACTIONS,
                actual: 99,
                ..
            }
        ));
    }

    #[test]
    fn test_wrong_action_width_is_rejected() {
        let model = MockModel::new();
        let device = Default::default();
        let target = QNetworkConfig::new(TEST_FEATURES).init::<TestBackend>(&device);
        let assembler = BatchAssembler::new(0.9, 22, TEST_FEATURES, None);

        let err = assembler
            .target_values(&target, &model, &batch(&model), &device)
            .unwrap_err();
        assert!(matches!(err, TrainingError::FeatureShape { expected: 22, actual: 4, .. }));
    }

    #[test]
    fn test_target_values_bootstrap_from_best_next_action() {
        let model = MockModel::new();
        let device = Default::default();
        let target = QNetworkConfig::new(TEST_FEATURES)
            .with_hidden_size(8)
            .init::<TestBackend>(&device);
        let gamma = 0.5;
        let assembler = BatchAssembler::new(gamma, TEST_ACTIONS, TEST_FEATURES, None);
        let entries = batch(&model);

        let values = assembler
            .target_values(&target, &model, &entries, &device)
            .unwrap();
        assert_eq!(values.len(), entries.len());

        for (entry, value) in entries.iter().zip(&values) {
            let next = model.features(&entry.step.next());
            let scores: Vec<f32> = target
                .forward(next.to_tensor(&device))
                .into_data()
                .to_vec()
                .unwrap();
            let best = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let expected = model.reward(&entry.step) + gamma * best;
            assert!((value - expected).abs() < 1e-5, "{value} vs {expected}");
        }
    }

    #[test]
    fn test_current_and_target_shapes_match() {
        let model = MockModel::new();
        let device = Default::default();
        let net = QNetworkConfig::new(TEST_FEATURES).init::<TestBackend>(&device);
        let k = model.symmetry_factor();
        let assembler = BatchAssembler::new(0.99, TEST_ACTIONS, TEST_FEATURES, Some(k));
        let entries = batch(&model);

        let current = assembler.current_q(&net, &model, &entries, &device).unwrap();
        let target = assembler
            .target_q::<TestBackend, TestBackend, _, _>(&net, &model, &entries, &device, &device)
            .unwrap();
        assert_eq!(current.shape().dims, [3 * k, 1]);
        assert_eq!(target.shape().dims, [3 * k, 1]);

        let data: Vec<f32> = target.into_data().to_vec().unwrap();
        for i in 0..3 {
            for r in 1..k {
                assert_eq!(data[i * k + r], data[i * k]);
            }
        }
    }
}
