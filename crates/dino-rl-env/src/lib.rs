//! Chrome Dino runner environments
//!
//! This crate wraps the Chrome offline runner game as gym-style
//! environments:
//! - Grayscale, raw colour and feature-vector observations
//! - A WebDriver-backed game oracle with automatic driver bootstrap
//! - A scripted in-memory oracle for tests and dry runs
//! - A static catalog of registered environment ids

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod encoding;
pub mod env;
pub mod error;
pub mod image_ops;
pub mod oracle;
pub mod registry;
pub mod reward;

// Re-export environments
pub use config::DriverConfig;
pub use encoding::{Encoding, InputMode};
pub use env::{ChromeDinoEnv, EnvOptions, Lifecycle, ACTION_MEANINGS, OVERRIDE_KEYS};
pub use error::DinoError;
pub use oracle::{DinoGame, Key, ScriptedGame, ScriptedObstacle, WebDriverGame};
pub use registry::{env_spec, list_envs, make_env, make_env_with, EnvSpec, Variant};
pub use reward::{RewardPolicy, ScoreMode};

// Re-export core types
pub use dino_rl_core::{
    ArrayObservation, BoxObservationSpace, DiscreteAction, DiscreteSpace, Environment,
    EnvironmentConfig, Observation, ObservationSpace, RenderMode, Reward, Step, StepInfo,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{make_env, make_env_with, ChromeDinoEnv, DinoGame, EnvOptions, ScriptedGame};
    pub use dino_rl_core::prelude::*;
}
