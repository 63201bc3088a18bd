//! Core reinforcement learning traits and types for the Chrome Dino environments
//!
//! This crate provides the gym-style vocabulary shared by the environment
//! crate and its callers: the [`Environment`] lifecycle, steps and episodes,
//! discrete action spaces and dtype-aware box observation spaces.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod environment;
pub mod error;
pub mod observation;
pub mod reward;

// Re-export core traits and types
pub use action::{Action, ActionSpace, DiscreteAction, DiscreteSpace};
pub use environment::{
    Environment, EnvironmentConfig, Episode, RenderMode, Step, StepInfo, TrackedEnvironment,
};
pub use error::{RLError, Result};
pub use observation::{ArrayObservation, BoxObservationSpace, Dtype, Observation, ObservationSpace};
pub use reward::Reward;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionSpace, ArrayObservation, DiscreteAction, Environment, Observation,
        ObservationSpace, RenderMode, Result, Reward, Step,
    };
}
