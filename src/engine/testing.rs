//! Small deterministic stand-ins for the simulator, shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::{ColorPermutations, FeatureMatrix, FeatureModel, Simulation, Step};

pub const TEST_ACTIONS: usize = 4;
pub const TEST_FEATURES: usize = 6;

#[derive(Debug, Clone)]
pub struct MockStep {
    pub id: u64,
    pub reward: f32,
    terminal: Arc<AtomicBool>,
}

impl MockStep {
    pub fn new(id: u64, terminal: bool) -> Self {
        MockStep {
            id,
            reward: id as f32,
            terminal: Arc::new(AtomicBool::new(terminal)),
        }
    }

    /// Mark the step resolved; visible through every clone.
    pub fn finish(&self) {
        self.terminal.store(true, Ordering::SeqCst);
    }
}

impl Step for MockStep {
    fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    fn next(&self) -> Self {
        MockStep::new(self.id + 1, true)
    }
}

/// Two colours over two cells, an action column and a bias column.
pub struct MockModel {
    perms: ColorPermutations,
}

impl MockModel {
    pub fn new() -> Self {
        MockModel {
            perms: ColorPermutations::new(2),
        }
    }

    pub fn symmetry_factor(&self) -> usize {
        self.perms.len()
    }
}

impl FeatureModel<MockStep> for MockModel {
    fn feature_num(&self) -> usize {
        TEST_FEATURES
    }

    fn features(&self, step: &MockStep) -> FeatureMatrix {
        let mut m = FeatureMatrix::zeros(TEST_ACTIONS, TEST_FEATURES);
        for a in 0..TEST_ACTIONS {
            let row = m.row_mut(a);
            row[(a % 2) * 2 + (step.id as usize % 2)] = 1.0;
            row[4] = a as f32 / TEST_ACTIONS as f32;
            row[5] = 1.0;
        }
        m
    }

    fn reward(&self, step: &MockStep) -> f32 {
        step.reward
    }

    fn color_rotate(&self, batch: &FeatureMatrix) -> FeatureMatrix {
        self.perms.rotate(batch, &[0..4])
    }
}

/// Each placement produces a new step that resolves immediately.
pub struct MockSim {
    pub next_id: u64,
    pub applied: Vec<usize>,
}

impl MockSim {
    pub fn new() -> Self {
        MockSim {
            next_id: 0,
            applied: Vec::new(),
        }
    }
}

impl Simulation for MockSim {
    type Step = MockStep;

    fn current_step(&self) -> MockStep {
        MockStep::new(self.next_id, true)
    }

    fn apply_action(&mut self, action: usize) {
        self.applied.push(action);
        self.next_id += 1;
    }
}
