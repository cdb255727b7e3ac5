//! Dual uniform replay oversampling transitions near obstacles.
use super::config::DualObstacleReplayBufferConfig;
use super::{mean, split_between, UniformReplayBuffer};
use crate::grid::{GridMap, GridPos};
use crate::{ExperienceBufferBase, PushContext, ReplayBufferBase, SampledBatch, Transition};
use anyhow::Result;
use log::debug;

/// True when any 8-connected neighbor of `pos` is an obstacle cell.
pub fn is_near_obstacle(pos: GridPos, map: &GridMap) -> bool {
    map.has_adjacent_obstacle(pos)
}

/// Records how a batch from a [`DualObstacleReplayBuffer`] was split.
///
/// The pools are uniform, so the token only carries lengths; feedback is a
/// loss-logging channel, not a priority update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitToken {
    /// Both pools were empty; nothing was sampled.
    Empty,

    /// The whole batch came from the near-obstacle pool.
    NearOnly(usize),

    /// The whole batch came from the general pool.
    AllOnly(usize),

    /// The batch concatenates near samples followed by general samples.
    Mixed {
        /// Number of near-pool samples at the front of the batch.
        near: usize,

        /// Number of general-pool samples at the back.
        all: usize,
    },
}

/// Per-pool sizes and the current sampling split, for logging.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DualObstacleStats {
    /// Entries in the near-obstacle pool.
    pub near_size: usize,

    /// Entries in the general pool.
    pub all_size: usize,

    /// Share of each batch requested from the near-obstacle pool.
    pub near_ratio: f64,
}

/// Two uniform pools with obstacle-proximity routing.
///
/// Every transition enters the general pool; those originating next to an
/// obstacle are mirrored into the near pool as well. Oversampling the near
/// pool is an early-training aid: the split is retuned on each episode-end
/// terminal push from recent loss feedback, and once training passes the
/// auxiliary-phase threshold the near share is forced to zero outright.
pub struct DualObstacleReplayBuffer<S, A> {
    near: UniformReplayBuffer<S, A>,
    all: UniformReplayBuffer<S, A>,
    near_ratio: f64,
    min_ratio: f64,
    max_ratio: f64,
    p0: f64,
    p1: f64,
    beta_t: f64,
    total_episodes: usize,
    episode_count: usize,
    exploration: f64,
    near_losses: Vec<f64>,
    all_losses: Vec<f64>,
}

impl<S: Clone, A: Clone> DualObstacleReplayBuffer<S, A> {
    /// Current pool sizes and sampling split.
    pub fn stats(&self) -> DualObstacleStats {
        DualObstacleStats {
            near_size: self.near.len(),
            all_size: self.all.len(),
            near_ratio: self.near_ratio,
        }
    }

    fn rebalance(&mut self) {
        let t = self.episode_count as f64 / self.total_episodes as f64;
        self.exploration = (self.exploration * 0.995).max(0.01);

        let l_all = mean(&self.all_losses);
        let l_near = mean(&self.near_losses);
        let total = if l_all + l_near > 0.0 {
            l_all + l_near
        } else {
            1.0
        };

        self.near_ratio = if t < self.beta_t {
            self.p0 * self.exploration + self.p1 * (l_near / total)
        } else {
            // Past the auxiliary phase the near pool is retired entirely.
            0.0
        };
        self.near_ratio = self.near_ratio.clamp(self.min_ratio, self.max_ratio);

        self.near_losses.clear();
        self.all_losses.clear();
        debug!(
            "episode {}: near_ratio adjusted to {:.3}",
            self.episode_count, self.near_ratio
        );
    }
}

impl<S: Clone, A: Clone> ExperienceBufferBase for DualObstacleReplayBuffer<S, A> {
    type Item = Transition<S, A>;

    fn push(&mut self, tr: Self::Item, ctx: &PushContext<'_>) -> Result<()> {
        let done = tr.done;
        if is_near_obstacle(ctx.position, ctx.map) {
            self.near.push(tr.clone(), ctx)?;
        }
        self.all.push(tr, ctx)?;
        if done && ctx.is_episode_end {
            self.episode_count += 1;
            self.rebalance();
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.near.len() + self.all.len()
    }
}

impl<S: Clone, A: Clone> ReplayBufferBase for DualObstacleReplayBuffer<S, A> {
    type Config = DualObstacleReplayBufferConfig;
    type Token = SplitToken;

    fn build(config: &Self::Config) -> Self {
        assert!(
            config.min_ratio <= config.max_ratio,
            "ratio bounds are inverted"
        );
        assert!(config.total_episodes > 0, "total_episodes must be positive");
        Self {
            near: UniformReplayBuffer::build(&config.near),
            all: UniformReplayBuffer::build(&config.all),
            near_ratio: config
                .initial_ratio
                .clamp(config.min_ratio, config.max_ratio),
            min_ratio: config.min_ratio,
            max_ratio: config.max_ratio,
            p0: config.p0,
            p1: config.p1,
            beta_t: config.beta_t,
            total_episodes: config.total_episodes,
            episode_count: 0,
            exploration: 1.0,
            near_losses: Vec::new(),
            all_losses: Vec::new(),
        }
    }

    fn sample(&mut self, size: usize, _beta: Option<f64>) -> SampledBatch<Self::Item, SplitToken> {
        let (n_near, n_all) =
            split_between(size, self.near_ratio, self.near.len(), self.all.len());

        if n_near == 0 && n_all == 0 {
            return SampledBatch {
                items: Vec::new(),
                token: SplitToken::Empty,
                weights: Vec::new(),
            };
        }
        if n_near == 0 {
            let batch = self.all.sample(n_all, None);
            let n = batch.items.len();
            return SampledBatch {
                items: batch.items,
                token: SplitToken::AllOnly(n),
                weights: vec![1.0; n],
            };
        }
        if n_all == 0 {
            let batch = self.near.sample(n_near, None);
            let n = batch.items.len();
            return SampledBatch {
                items: batch.items,
                token: SplitToken::NearOnly(n),
                weights: vec![1.0; n],
            };
        }

        let mut near_batch = self.near.sample(n_near, None);
        let all_batch = self.all.sample(n_all, None);
        let near = near_batch.items.len();
        let all = all_batch.items.len();
        near_batch.items.extend(all_batch.items);
        SampledBatch {
            weights: vec![1.0; near + all],
            items: near_batch.items,
            token: SplitToken::Mixed { near, all },
        }
    }

    /// Appends the batch's losses to the pool logs named by the token.
    ///
    /// The pools are uniform, so there are no priorities to rewrite; the
    /// logs only feed the next rebalance.
    fn update_priorities(&mut self, token: &SplitToken, values: &[f64]) {
        match *token {
            SplitToken::Empty => {}
            SplitToken::NearOnly(n) => {
                assert_eq!(n, values.len(), "loss log length mismatch");
                self.near_losses.extend_from_slice(values);
            }
            SplitToken::AllOnly(n) => {
                assert_eq!(n, values.len(), "loss log length mismatch");
                self.all_losses.extend_from_slice(values);
            }
            SplitToken::Mixed { near, all } => {
                assert_eq!(near + all, values.len(), "loss log length mismatch");
                let (near_values, all_values) = values.split_at(near);
                self.near_losses.extend_from_slice(near_values);
                self.all_losses.extend_from_slice(all_values);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> DualObstacleReplayBuffer<f64, u8> {
        DualObstacleReplayBuffer::build(&DualObstacleReplayBufferConfig::default())
    }

    fn tr(id: f64, done: bool) -> Transition<f64, u8> {
        let next = if done { None } else { Some(id + 1.0) };
        Transition::new(id, 0, id, next, done)
    }

    fn obstacle_map() -> GridMap {
        let mut map = GridMap::new(5, 5);
        map.set_obstacle(GridPos::new(2, 2));
        map
    }

    #[test]
    fn mirrors_near_obstacle_pushes_only() {
        let map = obstacle_map();
        let mut buf = buffer();

        let near_ctx = PushContext::new(GridPos::new(2, 1), &map);
        buf.push(tr(0.0, false), &near_ctx).unwrap();
        let far_ctx = PushContext::new(GridPos::new(0, 0), &map);
        buf.push(tr(1.0, false), &far_ctx).unwrap();

        let stats = buf.stats();
        assert_eq!(stats.near_size, 1);
        assert_eq!(stats.all_size, 2);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn rebalances_once_per_episode_end() {
        let map = obstacle_map();
        let mut buf = buffer();
        let ctx = PushContext::new(GridPos::new(0, 0), &map);

        // Terminal but not flagged as episode end: no rebalance.
        buf.push(tr(0.0, true), &ctx).unwrap();
        assert_eq!(buf.episode_count, 0);
        assert_eq!(buf.exploration, 1.0);

        let end_ctx = ctx.episode_end(true);
        buf.push(tr(0.0, true), &end_ctx).unwrap();
        assert_eq!(buf.episode_count, 1);
        assert!((buf.exploration - 0.995).abs() < 1e-12);
    }

    #[test]
    fn near_share_is_retired_after_auxiliary_phase() {
        let map = obstacle_map();
        let mut buf = DualObstacleReplayBuffer::<f64, u8>::build(
            &DualObstacleReplayBufferConfig::default().total_episodes(10),
        );
        let end_ctx = PushContext::new(GridPos::new(0, 0), &map).episode_end(true);

        // Episodes 1..=3: t < 0.4, ratio stays positive.
        for _ in 0..3 {
            buf.push(tr(0.0, true), &end_ctx).unwrap();
            assert!(buf.stats().near_ratio > 0.0);
        }
        // Episode 4: t = 0.4 reaches the threshold, near pool retired.
        buf.push(tr(0.0, true), &end_ctx).unwrap();
        assert_eq!(buf.stats().near_ratio, 0.0);
    }

    #[test]
    fn ratio_stays_clamped_across_rebalances() {
        let map = obstacle_map();
        let mut buf = buffer();
        let near_end = PushContext::new(GridPos::new(2, 1), &map).episode_end(true);

        for _ in 0..100 {
            buf.push(tr(0.0, true), &near_end).unwrap();
            let batch = buf.sample(8, None);
            if !batch.is_empty() {
                let values = vec![500.0; batch.len()];
                buf.update_priorities(&batch.token, &values);
            }
            let ratio = buf.stats().near_ratio;
            assert!((0.0..=0.6).contains(&ratio), "ratio {} escaped bounds", ratio);
        }
    }

    #[test]
    fn mixed_batches_split_near_then_all() {
        let map = obstacle_map();
        let mut buf = buffer();
        let near_ctx = PushContext::new(GridPos::new(2, 1), &map);
        let far_ctx = PushContext::new(GridPos::new(0, 0), &map);
        for i in 0..20 {
            buf.push(tr(i as f64, false), &near_ctx).unwrap();
            buf.push(tr(100.0 + i as f64, false), &far_ctx).unwrap();
        }

        let batch = buf.sample(10, None);
        assert_eq!(batch.len(), 10);
        assert!(batch.weights.iter().all(|&w| w == 1.0));
        match batch.token {
            SplitToken::Mixed { near, all } => {
                assert_eq!(near + all, 10);
                assert_eq!(near, 4); // default near_ratio 0.4
                buf.update_priorities(&batch.token, &vec![1.0; 10]);
                assert_eq!(buf.near_losses.len(), 4);
                assert_eq!(buf.all_losses.len(), 6);
            }
            other => panic!("expected Mixed, got {:?}", other),
        }
    }

    #[test]
    fn empty_pools_yield_empty_tagged_batch() {
        let mut buf = buffer();
        let batch = buf.sample(16, None);
        assert!(batch.is_empty());
        assert_eq!(batch.token, SplitToken::Empty);
    }
}
