//! Transitions and sampled batches.

/// One `(state, action, reward, next_state, done)` record of an
/// agent-environment interaction.
///
/// `next_state` is `None` exactly when the transition is terminal. States and
/// actions are opaque to this crate; they are stored and cloned, never
/// inspected.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S, A> {
    /// Observation the action was taken from.
    pub state: S,

    /// Action taken.
    pub action: A,

    /// Reward received for the step (or the folded n-step return).
    pub reward: f64,

    /// Observation after the step, `None` on terminal transitions.
    pub next_state: Option<S>,

    /// Whether the episode ended with this transition.
    pub done: bool,
}

impl<S, A> Transition<S, A> {
    /// Creates a transition.
    pub fn new(state: S, action: A, reward: f64, next_state: Option<S>, done: bool) -> Self {
        debug_assert_eq!(done, next_state.is_none());
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// A batch returned by [`ReplayBufferBase::sample`].
///
/// `token` records how the batch was drawn and is consumed by
/// [`ReplayBufferBase::update_priorities`] to route feedback back to the
/// slots (or pools) the batch came from. `weights` are importance-sampling
/// corrections, positionally aligned with `items`.
///
/// [`ReplayBufferBase::sample`]: crate::ReplayBufferBase::sample
/// [`ReplayBufferBase::update_priorities`]: crate::ReplayBufferBase::update_priorities
#[derive(Clone, Debug)]
pub struct SampledBatch<I, T> {
    /// Sampled transitions.
    pub items: Vec<I>,

    /// Routing token for priority feedback.
    pub token: T,

    /// Importance-sampling weights, one per item.
    pub weights: Vec<f64>,
}

impl<I, T> SampledBatch<I, T> {
    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch contains no transitions.
    ///
    /// Sampling an empty memory yields an empty batch rather than an error;
    /// callers must check this before using the batch.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
