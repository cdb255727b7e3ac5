//! Replay memory implementations.
//!
//! - [`UniformReplayBuffer`]: circular buffer with uniform sampling.
//! - [`PrioritizedReplayBuffer`]: sum-tree-backed prioritized sampling with
//!   importance-weight annealing.
//! - [`DualPrioritizedReplayBuffer`]: normal/elite pools routed by reward,
//!   with an adaptively retuned sampling split.
//! - [`DualObstacleReplayBuffer`]: near-obstacle/all pools routed by map
//!   adjacency, with the near share phased out as training progresses.
//! - [`NStepProcessor`]: folds consecutive raw steps into n-step
//!   transitions ahead of whichever memory is in use.
mod config;
mod dual_obstacle;
mod dual_prioritized;
mod iw_scheduler;
mod prioritized;
mod step_proc;
mod sum_tree;
mod uniform;

pub use config::{
    DualObstacleReplayBufferConfig, DualPrioritizedReplayBufferConfig, NStepConfig, PerConfig,
    PrioritizedReplayBufferConfig, UniformReplayBufferConfig,
};
pub use dual_obstacle::{
    is_near_obstacle, DualObstacleReplayBuffer, DualObstacleStats, SplitToken,
};
pub use dual_prioritized::{DualPrioritizedReplayBuffer, DualPrioritizedStats, DualToken};
pub use iw_scheduler::IwScheduler;
pub use prioritized::PrioritizedReplayBuffer;
pub use step_proc::{FoldedStep, NStepProcessor, RawStep};
pub use sum_tree::SumTree;
pub use uniform::UniformReplayBuffer;

/// Splits a requested batch size between two pools.
///
/// `ratio_a` is the share requested from the first pool. Each side is
/// clamped to its pool's current size and the shortfall is redistributed to
/// the other pool, never exceeding `size` in total.
pub(crate) fn split_between(
    size: usize,
    ratio_a: f64,
    len_a: usize,
    len_b: usize,
) -> (usize, usize) {
    let mut a = ((size as f64 * ratio_a).round() as usize).min(size);
    let mut b = size - a;
    if len_a < a && len_b < b {
        a = len_a;
        b = len_b;
    }
    if len_a < a {
        a = len_a;
        b = (size - a).min(len_b);
    }
    if len_b < b {
        b = len_b;
        a = (size - b).min(len_a);
    }
    (a, b)
}

/// Mean of a loss log, 0 when empty.
pub(crate) fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}
