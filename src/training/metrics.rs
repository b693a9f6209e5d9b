use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling-window training metrics.
pub struct TrainingMetrics {
    losses: VecDeque<f32>,
    rewards: VecDeque<f32>,
    capacity: usize,
    total_ticks: u64,    // lifetime count, never capped
    total_updates: u64,  // lifetime count, never capped
    window_start: Instant,
    window_ticks: u64,
    window_overhead: Duration, // checkpoint time excluded from throughput
}

impl TrainingMetrics {
    pub fn with_capacity(capacity: usize) -> Self {
        TrainingMetrics {
            losses: VecDeque::with_capacity(capacity),
            rewards: VecDeque::with_capacity(capacity),
            capacity,
            total_ticks: 0,
            total_updates: 0,
            window_start: Instant::now(),
            window_ticks: 0,
            window_overhead: Duration::ZERO,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn record_tick(&mut self) {
        self.total_ticks += 1;
        self.window_ticks += 1;
    }

    pub fn record_update(&mut self, loss: f32) {
        self.total_updates += 1;
        push_capped(&mut self.losses, loss, self.capacity);
    }

    /// Reward of a step whose outcome is now known.
    pub fn record_reward(&mut self, reward: f32) {
        push_capped(&mut self.rewards, reward, self.capacity);
    }

    /// Average loss over the last N updates.
    pub fn average_loss(&self, last_n: usize) -> f32 {
        tail_mean(&self.losses, last_n)
    }

    /// Average reward over the last N resolved steps.
    pub fn average_reward(&self, last_n: usize) -> f32 {
        tail_mean(&self.rewards, last_n)
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    /// Record time spent outside the tick loop (checkpointing) so it is
    /// excluded from the throughput window.
    pub fn record_overhead(&mut self, d: Duration) {
        self.window_overhead += d;
    }

    /// Ticks per second since the last `reset_window` call.
    pub fn ticks_per_sec(&self) -> f32 {
        let net = self.window_start.elapsed().saturating_sub(self.window_overhead);
        if net.is_zero() {
            return 0.0;
        }
        self.window_ticks as f32 / net.as_secs_f32()
    }

    /// Reset the throughput window (call after each log interval).
    pub fn reset_window(&mut self) {
        self.window_start = Instant::now();
        self.window_ticks = 0;
        self.window_overhead = Duration::ZERO;
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_capped(queue: &mut VecDeque<f32>, value: f32, capacity: usize) {
    queue.push_back(value);
    if queue.len() > capacity {
        queue.pop_front();
    }
}

fn tail_mean(queue: &VecDeque<f32>, last_n: usize) -> f32 {
    let n = queue.len().min(last_n);
    if n == 0 {
        return 0.0;
    }
    let sum: f32 = queue.iter().rev().take(n).sum();
    sum / n as f32
}
