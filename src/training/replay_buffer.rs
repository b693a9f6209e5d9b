use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::ai::ReplayEntry;
use crate::engine::Step;

/// Two-stage replay memory.
///
/// Entries enter a *pending* ring and move to a *finalized* ring once their
/// step becomes terminal (its reward is known). Only finalized entries are
/// sampled. Both rings hold at most `capacity` entries and drop the oldest
/// when full.
///
/// All methods take `&self`; share the buffer as `Arc<ReplayBuffer<_>>` to
/// push from a simulation thread while another thread samples. One mutex
/// guards both rings and the sampling RNG.
pub struct ReplayBuffer<S: Step> {
    inner: Mutex<Rings<S>>,
    capacity: usize,
}

struct Rings<S: Step> {
    pending: VecDeque<ReplayEntry<S>>,
    finalized: VecDeque<ReplayEntry<S>>,
    rng: StdRng,
}

impl<S: Step> ReplayBuffer<S> {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    /// Buffer with a deterministic sampling sequence.
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        assert!(capacity > 0, "replay capacity must be positive");
        ReplayBuffer {
            inner: Mutex::new(Rings {
                pending: VecDeque::with_capacity(capacity),
                finalized: VecDeque::with_capacity(capacity),
                rng,
            }),
            capacity,
        }
    }

    // The rings are plain queues; a panic elsewhere cannot leave them torn.
    fn lock(&self) -> MutexGuard<'_, Rings<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an entry to the pending ring. Drops the oldest pending entry when full.
    pub fn push(&self, entry: ReplayEntry<S>) {
        let mut rings = self.lock();
        if rings.pending.len() >= self.capacity {
            rings.pending.pop_front();
        }
        rings.pending.push_back(entry);
    }

    /// Move every terminal pending entry to the finalized ring, oldest
    /// first. Returns how many moved.
    ///
    /// Steps normally resolve in the order they were produced, so the
    /// resolved prefix is drained from the front. Entries that resolved
    /// behind a still-running one are then swept out in order.
    pub fn reclassify(&self) -> usize {
        let mut rings = self.lock();
        Self::reclassify_locked(&mut rings, self.capacity)
    }

    fn reclassify_locked(rings: &mut Rings<S>, capacity: usize) -> usize {
        let Rings {
            pending, finalized, ..
        } = rings;
        let mut finalize = |entry: ReplayEntry<S>| {
            if finalized.len() >= capacity {
                finalized.pop_front();
            }
            finalized.push_back(entry);
        };

        let mut moved = 0;
        while pending
            .front()
            .is_some_and(|entry| entry.step.is_terminal())
        {
            if let Some(entry) = pending.pop_front() {
                finalize(entry);
                moved += 1;
            }
        }
        if !pending.is_empty() {
            pending.retain(|entry| {
                if entry.step.is_terminal() {
                    finalize(entry.clone());
                    moved += 1;
                    false
                } else {
                    true
                }
            });
        }

        if moved > 0 {
            tracing::trace!(moved, "finalized replay entries");
        }
        moved
    }

    /// Draw `batch_size` distinct finalized entries uniformly at random.
    ///
    /// Reclassifies first, so each call costs O(pending). Returns `None`
    /// for an empty request or while fewer than `batch_size` entries are
    /// finalized. Sampled entries stay in the buffer.
    pub fn sample(&self, batch_size: usize) -> Option<Vec<ReplayEntry<S>>> {
        if batch_size == 0 {
            return None;
        }
        let mut rings = self.lock();
        Self::reclassify_locked(&mut rings, self.capacity);

        let len = rings.finalized.len();
        if len < batch_size {
            return None;
        }
        let Rings { finalized, rng, .. } = &mut *rings;
        let indices = index::sample(rng, len, batch_size);
        Some(indices.iter().map(|i| finalized[i].clone()).collect())
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn finalized_len(&self) -> usize {
        self.lock().finalized.len()
    }

    /// Entries held across both rings.
    pub fn len(&self) -> usize {
        let rings = self.lock();
        rings.pending.len() + rings.finalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
