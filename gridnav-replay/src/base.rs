//! Core interfaces and data types.
mod replay_buffer;
mod transition;
pub use replay_buffer::{ExperienceBufferBase, PushContext, ReplayBufferBase};
pub use transition::{SampledBatch, Transition};
