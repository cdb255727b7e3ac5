//! N-step folding of raw transitions ahead of the replay memories.
use super::config::NStepConfig;
use crate::grid::GridPos;
use crate::Transition;
use std::collections::VecDeque;

/// A raw environment step paired with the grid cell it started from.
#[derive(Clone, Debug)]
pub struct RawStep<S, A> {
    /// The 1-step transition produced by the environment.
    pub transition: Transition<S, A>,

    /// Position the action was taken from, kept for spatial routing.
    pub position: GridPos,
}

/// An n-step folded transition ready for a replay memory.
#[derive(Clone, Debug)]
pub struct FoldedStep<S, A> {
    /// Transition carrying the discounted n-step return.
    pub transition: Transition<S, A>,

    /// Position of the oldest raw step in the fold.
    pub position: GridPos,

    /// Set only on the final fold drained at an episode boundary, so a
    /// router rebalances exactly once per episode.
    pub is_episode_end: bool,
}

/// Folds up to `n_steps` consecutive raw transitions into single
/// bootstrapped transitions.
///
/// The window is a sliding deque: once it holds `n_steps` entries, each new
/// observation folds the window, emits the result and drops the oldest raw
/// entry. [`flush_episode`](Self::flush_episode) drains the remainder at an
/// episode boundary; episodes shorter than `n_steps` are handled entirely
/// by that drain.
pub struct NStepProcessor<S, A> {
    gamma: f64,
    n_steps: usize,
    window: VecDeque<RawStep<S, A>>,
}

impl<S: Clone, A: Clone> NStepProcessor<S, A> {
    /// Builds a processor from `config`.
    pub fn build(config: &NStepConfig) -> Self {
        assert!(config.n_steps > 0, "n_steps must be positive");
        Self {
            gamma: config.gamma,
            n_steps: config.n_steps,
            window: VecDeque::with_capacity(config.n_steps),
        }
    }

    /// Clears pending raw steps; call at the start of every episode.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Number of raw steps currently pending in the window.
    pub fn pending(&self) -> usize {
        self.window.len()
    }

    /// Feeds one raw step, emitting a folded transition once the window is
    /// full.
    pub fn observe(&mut self, step: RawStep<S, A>) -> Option<FoldedStep<S, A>> {
        self.window.push_back(step);
        if self.window.len() < self.n_steps {
            return None;
        }
        let folded = self.fold();
        self.window.pop_front();
        Some(folded)
    }

    /// Drains the window at an episode boundary, oldest entry first.
    ///
    /// Each drain folds the (shrinking) window and emits one transition;
    /// only the last emission carries `is_episode_end`.
    pub fn flush_episode(&mut self) -> Vec<FoldedStep<S, A>> {
        let mut out = Vec::with_capacity(self.window.len());
        while !self.window.is_empty() {
            let mut folded = self.fold();
            folded.is_episode_end = self.window.len() == 1;
            out.push(folded);
            self.window.pop_front();
        }
        out
    }

    /// Folds the current window into one transition.
    ///
    /// Rewards are discounted by position in the window; the fold stops at
    /// the first terminal entry and bootstraps from that entry's
    /// `next_state`, otherwise from the last entry's.
    fn fold(&self) -> FoldedStep<S, A> {
        let first = self.window.front().expect("fold on an empty window");
        let mut reward = 0.0;
        let mut next_state = None;
        let mut done = false;
        for (i, step) in self.window.iter().enumerate() {
            reward += self.gamma.powi(i as i32) * step.transition.reward;
            next_state = step.transition.next_state.clone();
            if step.transition.done {
                done = true;
                break;
            }
        }
        FoldedStep {
            transition: Transition::new(
                first.transition.state.clone(),
                first.transition.action.clone(),
                reward,
                next_state,
                done,
            ),
            position: first.position,
            is_episode_end: false,
        }
    }
}
