use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::action::ActionIndex;

use super::encoding::STATE_FEATURES;

/// One learner decision and its consequence.
#[derive(Clone, Debug)]
pub struct Transition {
    pub state: [f32; STATE_FEATURES],
    pub action: ActionIndex,
    pub reward: f32,
    pub next_state: [f32; STATE_FEATURES],
    pub done: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub capacity: usize,
    /// How strongly priorities skew sampling; 0 is uniform.
    pub alpha: f32,
    /// Initial importance-sampling exponent.
    pub beta: f32,
    /// Added to `beta` on every sample call, capped at 1.0.
    pub beta_increment: f32,
    /// Floor added to every TD error so no entry becomes unreachable.
    pub epsilon: f32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            alpha: 0.6,
            beta: 0.4,
            beta_increment: 0.001,
            epsilon: 1.0e-6,
        }
    }
}

/// Batch drawn from a [`PrioritizedReplayBuffer`].
#[derive(Clone, Debug)]
pub struct SampledBatch<T> {
    pub items: Vec<T>,
    /// Buffer slots the items came from, for [`PrioritizedReplayBuffer::update_priorities`].
    pub indices: Vec<usize>,
    /// Normalized importance-sampling weights, at most 1.0.
    pub weights: Vec<f32>,
}

impl<T> SampledBatch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Ring buffer that samples entries proportionally to `priority^alpha`.
///
/// When full, new entries overwrite the oldest ones. Fresh entries receive the
/// highest priority currently stored so they are seen at least once.
pub struct PrioritizedReplayBuffer<T> {
    config: ReplayConfig,
    data: Vec<T>,
    priorities: Vec<f32>,
    write_index: usize,
    beta: f32,
}

impl<T: Clone> PrioritizedReplayBuffer<T> {
    pub fn new(config: ReplayConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            config: ReplayConfig { capacity, ..config },
            data: Vec::with_capacity(capacity.min(4096)),
            priorities: Vec::with_capacity(capacity.min(4096)),
            write_index: 0,
            beta: config.beta,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    pub fn priority(&self, index: usize) -> Option<f32> {
        self.priorities.get(index).copied()
    }

    pub fn max_priority(&self) -> f32 {
        self.priorities
            .iter()
            .copied()
            .reduce(f32::max)
            .unwrap_or(1.0)
    }

    pub fn push(&mut self, item: T) {
        let priority = self.max_priority();
        if self.data.len() < self.config.capacity {
            self.data.push(item);
            self.priorities.push(priority);
            self.write_index = self.data.len() % self.config.capacity;
        } else {
            self.data[self.write_index] = item;
            self.priorities[self.write_index] = priority;
            self.write_index = (self.write_index + 1) % self.config.capacity;
        }
    }

    /// Draws `batch_size` entries with replacement. Returns `None` while the
    /// buffer holds fewer than `batch_size` entries.
    pub fn sample<R: Rng>(&mut self, batch_size: usize, rng: &mut R) -> Option<SampledBatch<T>> {
        if batch_size == 0 || self.data.len() < batch_size {
            return None;
        }
        let scaled: Vec<f64> = self
            .priorities
            .iter()
            .map(|p| (*p as f64).powf(self.config.alpha as f64))
            .collect();
        let total: f64 = scaled.iter().sum();
        let distribution = WeightedIndex::new(&scaled).ok()?;

        self.beta = (self.beta + self.config.beta_increment).min(1.0);
        let count = self.data.len() as f64;
        let indices: Vec<usize> = (0..batch_size)
            .map(|_| distribution.sample(rng))
            .collect();
        let mut weights: Vec<f32> = indices
            .iter()
            .map(|&idx| {
                let probability = scaled[idx] / total;
                (count * probability).powf(-(self.beta as f64)) as f32
            })
            .collect();
        let max_weight = weights.iter().copied().fold(0.0f32, f32::max);
        if max_weight > 0.0 {
            for weight in &mut weights {
                *weight /= max_weight;
            }
        }
        let items = indices.iter().map(|&idx| self.data[idx].clone()).collect();
        Some(SampledBatch {
            items,
            indices,
            weights,
        })
    }

    /// Sets each slot's priority to `|td_error| + epsilon`. Out-of-range slots are ignored.
    pub fn update_priorities(&mut self, indices: &[usize], td_errors: &[f32]) {
        for (&idx, td) in indices.iter().zip(td_errors) {
            if let Some(slot) = self.priorities.get_mut(idx) {
                let priority = td.abs() + self.config.epsilon;
                if priority.is_finite() {
                    *slot = priority;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn buffer(capacity: usize) -> PrioritizedReplayBuffer<u32> {
        PrioritizedReplayBuffer::new(ReplayConfig {
            capacity,
            ..ReplayConfig::default()
        })
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut replay = buffer(3);
        for value in 0..5 {
            replay.push(value);
        }
        assert_eq!(replay.len(), 3);
        let mut stored = replay.data.clone();
        stored.sort();
        assert_eq!(stored, vec![2, 3, 4]);
    }

    #[test]
    fn new_entries_receive_max_priority() {
        let mut replay = buffer(8);
        replay.push(1);
        assert_eq!(replay.priority(0), Some(1.0));
        replay.update_priorities(&[0], &[-3.0]);
        replay.push(2);
        let expected = 3.0 + 1.0e-6;
        assert!((replay.priority(1).unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn sample_requires_a_full_batch() {
        let mut replay = buffer(8);
        let mut rng = StdRng::seed_from_u64(1);
        replay.push(1);
        assert!(replay.sample(2, &mut rng).is_none());
        replay.push(2);
        let batch = replay.sample(2, &mut rng).expect("batch");
        assert_eq!(batch.len(), 2);
        assert!(batch.weights.iter().all(|w| *w > 0.0 && *w <= 1.0));
    }

    #[test]
    fn beta_anneals_towards_one() {
        let mut replay = buffer(4);
        let mut rng = StdRng::seed_from_u64(2);
        replay.push(1);
        let before = replay.beta();
        replay.sample(1, &mut rng).expect("batch");
        assert!(replay.beta() > before);
        for _ in 0..1000 {
            replay.sample(1, &mut rng);
        }
        assert_eq!(replay.beta(), 1.0);
    }

    #[test]
    fn rare_entries_get_the_largest_weight() {
        let mut replay = buffer(4);
        let mut rng = StdRng::seed_from_u64(3);
        for value in 0..4 {
            replay.push(value);
        }
        replay.update_priorities(&[0, 1, 2, 3], &[10.0, 0.1, 0.1, 0.1]);
        let batch = replay.sample(64, &mut rng).expect("batch");
        assert!(batch.indices.iter().any(|idx| *idx != 0));
        for (idx, weight) in batch.indices.iter().zip(&batch.weights) {
            if *idx == 0 {
                assert!(*weight < 1.0);
            }
        }
    }
}
