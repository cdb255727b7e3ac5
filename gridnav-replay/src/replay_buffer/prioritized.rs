//! Prioritized replay memory backed by a sum tree.
use super::config::PrioritizedReplayBufferConfig;
use super::{IwScheduler, SumTree};
use crate::{ExperienceBufferBase, PushContext, ReplayBufferBase, SampledBatch, Transition};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Width given to degenerate zero-width sampling segments.
const SEGMENT_NUDGE: f64 = 1e-8;

/// A replay memory sampling transitions in proportion to their priority.
///
/// New transitions enter with the maximum priority seen so far (at least
/// 1.0), so each is sampled at least once before its learning error is
/// known. Sampling is stratified: the priority mass is partitioned into
/// equal-width segments and one value is drawn per segment, which spreads a
/// batch across the whole priority distribution. Importance-sampling
/// weights are normalized so the largest weight in every batch is 1.0; the
/// correction strength beta anneals toward 1.0 over the configured number
/// of sampling steps unless the caller overrides it per call.
pub struct PrioritizedReplayBuffer<S, A> {
    tree: SumTree<Transition<S, A>>,
    alpha: f64,
    epsilon: f64,
    iw_scheduler: IwScheduler,
    rng: StdRng,
}

impl<S: Clone, A: Clone> PrioritizedReplayBuffer<S, A> {
    /// Current annealed beta without advancing the schedule.
    pub fn beta(&self) -> f64 {
        self.iw_scheduler.beta()
    }

    pub(crate) fn tree(&self) -> &SumTree<Transition<S, A>> {
        &self.tree
    }

    fn next_beta(&mut self, beta: Option<f64>) -> f64 {
        match beta {
            Some(b) => b,
            None => {
                let b = self.iw_scheduler.beta();
                self.iw_scheduler.add_n_samples();
                b
            }
        }
    }
}

impl<S: Clone, A: Clone> ExperienceBufferBase for PrioritizedReplayBuffer<S, A> {
    type Item = Transition<S, A>;

    fn push(&mut self, tr: Self::Item, _ctx: &PushContext<'_>) -> Result<()> {
        let priority = self.tree.max_priority().max(1.0);
        self.tree.add(priority, tr);
        Ok(())
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}

impl<S: Clone, A: Clone> ReplayBufferBase for PrioritizedReplayBuffer<S, A> {
    type Config = PrioritizedReplayBufferConfig;
    type Token = Vec<usize>;

    fn build(config: &Self::Config) -> Self {
        Self {
            tree: SumTree::new(config.capacity),
            alpha: config.per_config.alpha,
            epsilon: config.per_config.epsilon,
            iw_scheduler: IwScheduler::new(
                config.per_config.beta_0,
                config.per_config.beta_frames,
            ),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn sample(&mut self, size: usize, beta: Option<f64>) -> SampledBatch<Self::Item, Vec<usize>> {
        let beta = self.next_beta(beta);
        if self.tree.is_empty() || size == 0 {
            return SampledBatch {
                items: Vec::new(),
                token: Vec::new(),
                weights: Vec::new(),
            };
        }

        let total = self.tree.total();
        let segment = total / size as f64;
        let min_prob = self.tree.min_priority() / total;

        let mut items = Vec::with_capacity(size);
        let mut leaves = Vec::with_capacity(size);
        let mut weights = Vec::with_capacity(size);
        for i in 0..size {
            let a = segment * i as f64;
            let mut b = segment * (i + 1) as f64;
            if a == b {
                b = a + SEGMENT_NUDGE;
            }
            let value = self.rng.gen_range(a..b);
            let (leaf, priority, tr) = self.tree.get_leaf(value);
            let prob = priority / total;
            let weight = if min_prob > 0.0 {
                (prob / min_prob).powf(-beta)
            } else {
                1.0
            };
            items.push(tr.clone());
            leaves.push(leaf);
            weights.push(weight);
        }

        let max_weight = weights.iter().fold(0.0f64, |m, &w| w.max(m));
        if max_weight > 0.0 {
            for w in weights.iter_mut() {
                *w /= max_weight;
            }
        }

        SampledBatch {
            items,
            token: leaves,
            weights,
        }
    }

    fn update_priorities(&mut self, token: &Vec<usize>, values: &[f64]) {
        assert_eq!(
            token.len(),
            values.len(),
            "priority update length mismatch"
        );
        for (&leaf, &err) in token.iter().zip(values.iter()) {
            let priority = (err.abs() + self.epsilon).powf(self.alpha);
            self.tree.update(leaf, priority);
        }
    }
}
