//! Uniform replay memory.
use super::config::UniformReplayBufferConfig;
use crate::{ExperienceBufferBase, PushContext, ReplayBufferBase, SampledBatch, Transition};
use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};

/// A fixed-capacity circular buffer sampled uniformly at random.
///
/// Entries are overwritten in pure insertion order once the buffer is full.
/// Sampling draws distinct entries without replacement; requests larger
/// than the current size yield a correspondingly smaller batch.
pub struct UniformReplayBuffer<S, A> {
    capacity: usize,
    entries: Vec<Transition<S, A>>,
    cursor: usize,
    rng: StdRng,
}

impl<S: Clone, A: Clone> ExperienceBufferBase for UniformReplayBuffer<S, A> {
    type Item = Transition<S, A>;

    fn push(&mut self, tr: Self::Item, _ctx: &PushContext<'_>) -> Result<()> {
        if self.entries.len() < self.capacity {
            self.entries.push(tr);
        } else {
            self.entries[self.cursor] = tr;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<S: Clone, A: Clone> ReplayBufferBase for UniformReplayBuffer<S, A> {
    type Config = UniformReplayBufferConfig;
    type Token = ();

    fn build(config: &Self::Config) -> Self {
        assert!(config.capacity > 0, "replay buffer capacity must be positive");
        Self {
            capacity: config.capacity,
            entries: Vec::with_capacity(config.capacity),
            cursor: 0,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn sample(&mut self, size: usize, _beta: Option<f64>) -> SampledBatch<Self::Item, ()> {
        let size = size.min(self.entries.len());
        if size == 0 {
            return SampledBatch {
                items: Vec::new(),
                token: (),
                weights: Vec::new(),
            };
        }
        let items = rand::seq::index::sample(&mut self.rng, self.entries.len(), size)
            .iter()
            .map(|ix| self.entries[ix].clone())
            .collect();
        SampledBatch {
            items,
            token: (),
            weights: vec![1.0; size],
        }
    }

    /// Uniform entries carry no priorities; feedback is discarded.
    fn update_priorities(&mut self, _token: &(), _values: &[f64]) {}
}
