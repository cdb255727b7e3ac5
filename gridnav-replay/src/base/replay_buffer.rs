//! Replay memory interfaces.
//!
//! Every memory variant implements the same capability set: `push`
//! transitions in, `sample` weighted batches out, `update_priorities` to
//! feed learning errors back, `len` for the stored count. The producer
//! (environment interaction) and consumer (learning step) are assumed to
//! interleave strictly sequentially; the traits provide no internal
//! synchronization.
use super::SampledBatch;
use crate::grid::{GridMap, GridPos};
use anyhow::Result;

/// Per-push context supplied by the training loop.
///
/// The map and position are passed explicitly on every call; variants that
/// do not route spatially ignore them. `is_episode_end` marks the final
/// push drained at an episode boundary and is what drives periodic
/// rebalancing in the obstacle-proximity router.
#[derive(Clone, Copy)]
pub struct PushContext<'a> {
    /// Grid cell the transition originated from.
    pub position: GridPos,

    /// Obstacle layout the episode is running on.
    pub map: &'a GridMap,

    /// True only on the last push of an episode.
    pub is_episode_end: bool,
}

impl<'a> PushContext<'a> {
    /// Creates a context for an ordinary mid-episode push.
    pub fn new(position: GridPos, map: &'a GridMap) -> Self {
        Self {
            position,
            map,
            is_episode_end: false,
        }
    }

    /// Sets the episode-end flag.
    pub fn episode_end(mut self, is_episode_end: bool) -> Self {
        self.is_episode_end = is_episode_end;
        self
    }
}

/// Interface for buffers that store experiences from an environment.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes an experience into the buffer.
    ///
    /// Once the buffer is at capacity the oldest stored entry is
    /// overwritten; insertion order alone decides eviction.
    fn push(&mut self, tr: Self::Item, ctx: &PushContext<'_>) -> Result<()>;

    /// Number of experiences currently stored, across all owned pools.
    fn len(&self) -> usize;

    /// Whether the buffer holds no experiences.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay memories that generate weighted batches.
pub trait ReplayBufferBase: ExperienceBufferBase {
    /// Configuration parameters for the memory.
    type Config: Clone;

    /// Routing token produced by [`sample`] and consumed by
    /// [`update_priorities`].
    ///
    /// Tokens are per-variant types, so feedback for a batch can only be
    /// delivered to the memory that produced it.
    ///
    /// [`sample`]: Self::sample
    /// [`update_priorities`]: Self::update_priorities
    type Token;

    /// Builds a memory from the given configuration.
    ///
    /// Panics on configurations that violate the construction contract
    /// (e.g. a zero capacity).
    fn build(config: &Self::Config) -> Self;

    /// Samples a batch of up to `size` experiences.
    ///
    /// `beta` overrides the annealed importance-weight exponent where the
    /// variant uses one; `None` lets the memory's own schedule advance.
    /// An empty memory yields an empty batch.
    fn sample(&mut self, size: usize, beta: Option<f64>) -> SampledBatch<Self::Item, Self::Token>;

    /// Feeds per-sample learning errors back to the memory.
    ///
    /// `values` are positionally paired with the batch the token came from.
    /// Passing a token with mismatched lengths is a caller bug and fails an
    /// assertion rather than misrouting feedback.
    fn update_priorities(&mut self, token: &Self::Token, values: &[f64]);
}
