#![warn(missing_docs)]
//! Experience replay memories for grid-navigation reinforcement learning.
//!
//! The crate provides a family of fixed-capacity replay memories sharing one
//! interface: a plain uniform buffer, a prioritized buffer backed by a sum
//! tree, two dual-pool routers (reward-gated and obstacle-proximity-gated)
//! that adaptively retune how batches are split between their pools, and an
//! n-step processor that folds consecutive raw transitions before they reach
//! a memory. Neural networks, environment stepping and map generation are
//! external; the crate only defines the data types exchanged with them.
pub mod grid;
pub mod replay_buffer;

mod base;
pub use base::{
    ExperienceBufferBase, PushContext, ReplayBufferBase, SampledBatch, Transition,
};
