//! Catalog of the registered Chrome Dino environments

use std::collections::BTreeMap;

use dino_rl_core::{EnvironmentConfig, RLError, Result};
use tracing::info;

use crate::config::DriverConfig;
use crate::encoding::InputMode;
use crate::env::{ChromeDinoEnv, EnvOptions};
use crate::oracle::{DinoGame, WebDriverGame};

/// Observation family of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Grayscale frames
    Grayscale {
        /// `f32` in `[0, 1]` rather than `u8`
        normalize: bool,
    },
    /// Full colour frames
    RawColor,
    /// Normalised feature vectors
    Features(InputMode),
    /// Feature vectors plus a preview frame, restarting after a crash
    FeaturesPreview(InputMode),
}

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSpec {
    /// Registered identifier
    pub id: &'static str,
    /// Observation family
    pub variant: Variant,
    /// Show the browser window
    pub render: bool,
    /// Keep the game's speed ramp-up
    pub accelerate: bool,
}

impl EnvSpec {
    const fn new(id: &'static str, variant: Variant, render: bool, accelerate: bool) -> Self {
        Self { id, variant, render, accelerate }
    }

    /// Default options for this entry
    #[must_use]
    pub fn options(&self) -> EnvOptions {
        let options = match self.variant {
            Variant::Grayscale { normalize } => EnvOptions::pixels(normalize),
            Variant::RawColor => EnvOptions::raw_color(),
            Variant::Features(mode) => EnvOptions::feature_vector(mode),
            Variant::FeaturesPreview(mode) => EnvOptions::feature_vector(mode).with_preview(),
        };
        options.with_accelerate(self.accelerate)
    }

    /// Entry options with `config.params` applied on top
    pub fn resolve(&self, config: &EnvironmentConfig) -> Result<EnvOptions> {
        Ok(self.options().apply_params(&config.params)?)
    }
}

const CATALOG: [EnvSpec; 14] = [
    EnvSpec::new("ChromeDino-v0", Variant::Grayscale { normalize: true }, true, true),
    EnvSpec::new("ChromeDinoNoBrowser-v0", Variant::Grayscale { normalize: true }, false, false),
    EnvSpec::new("ChromeDinoNotNorm-v0", Variant::Grayscale { normalize: false }, true, true),
    EnvSpec::new("ChromeDinoNotNormNoBrowser-v0", Variant::Grayscale { normalize: false }, false, false),
    EnvSpec::new("ChromeDinoRaw-v0", Variant::RawColor, true, true),
    EnvSpec::new("ChromeDinoRawNoBrowser-v0", Variant::RawColor, false, false),
    EnvSpec::new("ChromeDinoGAOneObstacle-v0", Variant::Features(InputMode::OneObstacle), true, true),
    EnvSpec::new("ChromeDinoGATwoObstacle-v0", Variant::Features(InputMode::TwoObstacle), true, true),
    EnvSpec::new("ChromeDinoGAOneObstacleNoBrowser-v0", Variant::Features(InputMode::OneObstacle), false, true),
    EnvSpec::new("ChromeDinoGATwoObstacleNoBrowser-v0", Variant::Features(InputMode::TwoObstacle), false, true),
    EnvSpec::new("ChromeDinoRLPo-v0", Variant::FeaturesPreview(InputMode::OneObstacle), true, true),
    EnvSpec::new("ChromeDinoRLPoNoBrowser-v0", Variant::FeaturesPreview(InputMode::OneObstacle), false, true),
    EnvSpec::new("ChromeDinoRLPoTwoObstacles-v0", Variant::FeaturesPreview(InputMode::TwoObstacle), true, true),
    EnvSpec::new(
        "ChromeDinoRLPoTwoObstaclesNoBrowser-v0",
        Variant::FeaturesPreview(InputMode::TwoObstacle),
        false,
        true,
    ),
];

lazy_static::lazy_static! {
    static ref REGISTRY: BTreeMap<&'static str, EnvSpec> =
        CATALOG.iter().map(|spec| (spec.id, *spec)).collect();
}

/// Look up a catalog entry
pub fn env_spec(id: &str) -> Result<EnvSpec> {
    REGISTRY
        .get(id)
        .copied()
        .ok_or_else(|| RLError::Environment(format!("Unknown environment: {id}")))
}

/// Launch a browser-backed environment.
///
/// Driver settings come from [`DriverConfig::load`]; the entry's render
/// flag, or a boolean `render` param, decides whether the window is shown.
pub async fn make_env(id: &str, config: EnvironmentConfig) -> Result<ChromeDinoEnv<WebDriverGame>> {
    let spec = env_spec(id)?;
    let options = spec.resolve(&config)?;
    let render = match config.params.get("render") {
        Some(value) => value
            .as_bool()
            .ok_or_else(|| RLError::Environment(format!("render must be a boolean, got {value}")))?,
        None => spec.render,
    };

    let driver = DriverConfig::load(None)?.with_render(render);
    info!(id, render, url = %driver.url, "launching environment");
    let game = WebDriverGame::launch(&driver).await?;
    ChromeDinoEnv::new(game, options).await
}

/// Build a catalog environment around an existing oracle
pub async fn make_env_with<G: DinoGame>(id: &str, game: G, config: EnvironmentConfig) -> Result<ChromeDinoEnv<G>> {
    let options = env_spec(id)?.resolve(&config)?;
    ChromeDinoEnv::new(game, options).await
}

/// All registered identifiers, sorted
#[must_use]
pub fn list_envs() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}
