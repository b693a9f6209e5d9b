use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Exponentially decaying exploration rate.
///
/// `epsilon(t) = end + (start - end) * exp(-t / decay)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorationSchedule {
    pub start: f32,
    pub end: f32,
    pub decay: f32,
}

impl ExplorationSchedule {
    pub fn new(start: f32, end: f32, decay: f32) -> Self {
        ExplorationSchedule { start, end, decay }
    }

    pub fn epsilon(&self, steps_done: u64) -> f32 {
        if self.decay <= 0.0 {
            return if steps_done == 0 { self.start } else { self.end };
        }
        let start = self.start as f64;
        let end = self.end as f64;
        (end + (start - end) * (-(steps_done as f64) / self.decay as f64).exp()) as f32
    }
}

/// Epsilon-greedy bookkeeping: the step counter and the random source.
///
/// Greedy evaluation is left to the caller, which owns the network.
pub struct ExplorationPolicy {
    schedule: ExplorationSchedule,
    steps_done: u64,
    rng: StdRng,
}

impl ExplorationPolicy {
    pub fn new(schedule: ExplorationSchedule) -> Self {
        Self::with_rng(schedule, StdRng::from_os_rng())
    }

    pub fn with_rng(schedule: ExplorationSchedule, rng: StdRng) -> Self {
        ExplorationPolicy {
            schedule,
            steps_done: 0,
            rng,
        }
    }

    pub fn schedule(&self) -> &ExplorationSchedule {
        &self.schedule
    }

    pub fn steps_done(&self) -> u64 {
        self.steps_done
    }

    pub fn set_steps_done(&mut self, steps_done: u64) {
        self.steps_done = steps_done;
    }

    /// Rate at the current step count, without advancing it.
    pub fn current_epsilon(&self) -> f32 {
        self.schedule.epsilon(self.steps_done)
    }

    /// Decide whether to explore.
    ///
    /// Without an override the counter advances first and epsilon comes
    /// from the new count; an override leaves the counter untouched.
    /// Returns a uniform action in `[0, action_num)` when exploring, `None`
    /// when the caller should act greedily.
    pub fn explore(&mut self, action_num: usize, epsilon_override: Option<f32>) -> Option<usize> {
        let epsilon = match epsilon_override {
            Some(eps) => eps,
            None => {
                self.steps_done += 1;
                self.schedule.epsilon(self.steps_done)
            }
        };
        if self.rng.random_range(0.0..1.0) < epsilon {
            Some(self.rng.random_range(0..action_num))
        } else {
            None
        }
    }
}

/// Index of the first maximum. NaN entries never win.
pub fn argmax_first(values: &[f32]) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best_value = v;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> ExplorationSchedule {
        ExplorationSchedule::new(0.9, 0.05, 1000.0)
    }

    #[test]
    fn test_epsilon_starts_at_start() {
        assert_eq!(schedule().epsilon(0), 0.9);
    }

    #[test]
    fn test_epsilon_strictly_decreasing() {
        let s = schedule();
        let mut prev = s.epsilon(0);
        for t in (1..5000).step_by(7) {
            let eps = s.epsilon(t);
            assert!(eps < prev, "epsilon({t}) = {eps} not below {prev}");
            assert!(eps > 0.05);
            prev = eps;
        }
    }

    #[test]
    fn test_epsilon_approaches_end() {
        let eps = schedule().epsilon(1_000_000);
        assert!((eps - 0.05).abs() < 1e-6, "got {eps}");
    }

    #[test]
    fn test_epsilon_zero_decay_jumps_to_end() {
        let s = ExplorationSchedule::new(1.0, 0.1, 0.0);
        assert_eq!(s.epsilon(0), 1.0);
        assert_eq!(s.epsilon(1), 0.1);
    }

    #[test]
    fn test_explore_advances_counter_without_override() {
        let mut policy = ExplorationPolicy::with_rng(schedule(), StdRng::seed_from_u64(1));
        policy.explore(22, None);
        policy.explore(22, None);
        assert_eq!(policy.steps_done(), 2);
    }

    #[test]
    fn test_override_does_not_advance_counter() {
        let mut policy = ExplorationPolicy::with_rng(schedule(), StdRng::seed_from_u64(1));
        policy.explore(22, Some(0.0));
        policy.explore(22, Some(1.0));
        assert_eq!(policy.steps_done(), 0);
    }

    #[test]
    fn test_override_zero_never_explores() {
        let mut policy = ExplorationPolicy::with_rng(schedule(), StdRng::seed_from_u64(2));
        for _ in 0..500 {
            assert_eq!(policy.explore(22, Some(0.0)), None);
        }
    }

    #[test]
    fn test_override_one_covers_action_space() {
        let mut policy = ExplorationPolicy::with_rng(schedule(), StdRng::seed_from_u64(3));
        let mut seen = [0usize; 22];
        for _ in 0..5000 {
            let a = policy.explore(22, Some(1.0)).expect("always explores");
            assert!(a < 22);
            seen[a] += 1;
        }
        // roughly uniform: every action well represented
        assert!(seen.iter().all(|&n| n > 100), "{seen:?}");
    }

    #[test]
    fn test_argmax_first_breaks_ties_low() {
        assert_eq!(argmax_first(&[0.1, 0.5, 0.5, 0.2]), 1);
        assert_eq!(argmax_first(&[3.0]), 0);
        assert_eq!(argmax_first(&[f32::NAN, -1.0]), 1);
    }
}
