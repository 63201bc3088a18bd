//! The Chrome Dino environment adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use dino_rl_core::{
    ActionSpace, ArrayObservation, BoxObservationSpace, DiscreteAction, DiscreteSpace,
    Environment, Observation, ObservationSpace, RLError, RenderMode, Result, Step, StepInfo,
};

use crate::encoding::{Encoding, InputMode};
use crate::error::DinoError;
use crate::oracle::{DinoGame, Key, ACCELERATION};
use crate::reward::{RewardPolicy, ScoreMode};

/// Labels of the positional actions, in order
pub const ACTION_MEANINGS: [&str; 4] = ["NOOP", "UP", "DOWN", "SPACE"];

/// Keys accepted by [`EnvOptions::apply_params`]
pub const OVERRIDE_KEYS: [&str; 5] = ["input_mode", "score_mode", "norm", "accelerate", "render"];

/// Construction options of a [`ChromeDinoEnv`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvOptions {
    /// Observation encoding
    pub encoding: Encoding,
    /// Size of the action space, a prefix of [`ACTION_MEANINGS`]
    pub actions: usize,
    /// Keep the game's speed ramp-up
    pub accelerate: bool,
    /// Reward assignment
    pub reward: RewardPolicy,
    /// Attach a normalised grayscale frame to every step's info as `preview`
    pub preview: bool,
    /// Restart the game right after a crash has been reported
    pub restart_on_crash: bool,
}

impl EnvOptions {
    /// Grayscale frames, two actions
    #[must_use]
    pub fn pixels(normalize: bool) -> Self {
        Self {
            encoding: Encoding::Grayscale { normalize },
            actions: 2,
            accelerate: true,
            reward: RewardPolicy::default(),
            preview: false,
            restart_on_crash: false,
        }
    }

    /// Full colour frames, two actions
    #[must_use]
    pub fn raw_color() -> Self {
        Self {
            encoding: Encoding::RawColor,
            ..Self::pixels(false)
        }
    }

    /// Normalised feature vectors, three actions.
    ///
    /// Fails with [`DinoError::UnsupportedInputMode`] for anything but
    /// `one_obstacle` and `two_obstacle`.
    pub fn features(input_mode: &str) -> std::result::Result<Self, DinoError> {
        Ok(Self::feature_vector(input_mode.parse()?))
    }

    /// Normalised feature vectors for an already parsed mode
    #[must_use]
    pub fn feature_vector(mode: InputMode) -> Self {
        Self {
            encoding: Encoding::Features { mode, normalize: true },
            actions: 3,
            ..Self::pixels(true)
        }
    }

    /// Set the acceleration flag
    #[must_use]
    pub fn with_accelerate(mut self, accelerate: bool) -> Self {
        self.accelerate = accelerate;
        self
    }

    /// Turn on the preview frame and restart-on-crash
    #[must_use]
    pub fn with_preview(mut self) -> Self {
        self.preview = true;
        self.restart_on_crash = true;
        self
    }

    /// Set the score mode from its name
    pub fn with_score_mode(mut self, mode: &str) -> std::result::Result<Self, DinoError> {
        self.reward.mode = mode.parse()?;
        Ok(self)
    }

    /// Apply string-keyed overrides: `input_mode`, `score_mode`, `norm`, `accelerate`.
    ///
    /// `render` is accepted and left to the launcher; any other key is an error.
    pub fn apply_params(
        mut self,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<Self, DinoError> {
        if let Some(key) = params.keys().find(|key| !OVERRIDE_KEYS.contains(&key.as_str())) {
            return Err(DinoError::Config(format!(
                "unknown override '{key}', expected one of {}",
                OVERRIDE_KEYS.join(", ")
            )));
        }
        if let Some(value) = params.get("input_mode") {
            let mode: InputMode = as_str("input_mode", value)?.parse()?;
            match &mut self.encoding {
                Encoding::Features { mode: current, .. } => *current = mode,
                other => {
                    return Err(DinoError::Config(format!(
                        "input_mode only applies to feature encodings, not {other:?}"
                    )))
                }
            }
        }
        if let Some(value) = params.get("score_mode") {
            self.reward.mode = as_str("score_mode", value)?.parse()?;
        }
        if let Some(value) = params.get("norm") {
            let norm = as_bool("norm", value)?;
            match &mut self.encoding {
                Encoding::Grayscale { normalize } | Encoding::Features { normalize, .. } => *normalize = norm,
                Encoding::RawColor => {
                    return Err(DinoError::Config("norm does not apply to raw colour frames".into()))
                }
            }
        }
        if let Some(value) = params.get("accelerate") {
            self.accelerate = as_bool("accelerate", value)?;
        }
        Ok(self)
    }
}

fn as_str<'a>(key: &str, value: &'a serde_json::Value) -> std::result::Result<&'a str, DinoError> {
    value.as_str().ok_or_else(|| DinoError::Config(format!("{key} must be a string, got {value}")))
}

fn as_bool(key: &str, value: &serde_json::Value) -> std::result::Result<bool, DinoError> {
    value.as_bool().ok_or_else(|| DinoError::Config(format!("{key} must be a boolean, got {value}")))
}

/// Where an environment is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Constructed, start screen dismissed
    Ready,
    /// Episode in progress
    Running,
    /// The last step reported `done`
    Crashed,
    /// Oracle released; nothing works any more
    Closed,
}

/// Chrome Dino as a gym-style environment.
///
/// Owns its oracle. Observation shape and dtype never change after
/// construction; actions outside the declared set are ignored.
pub struct ChromeDinoEnv<G> {
    game: G,
    options: EnvOptions,
    space: BoxObservationSpace,
    defaults: HashMap<String, f64>,
    current_frame: ArrayObservation,
    lifecycle: Lifecycle,
}

impl<G: DinoGame> ChromeDinoEnv<G> {
    /// Take over a loaded game: capture default parameters, apply the
    /// acceleration flag and press space to leave the start screen.
    pub async fn new(game: G, options: EnvOptions) -> Result<Self> {
        if !(1..=ACTION_MEANINGS.len()).contains(&options.actions) {
            return Err(RLError::InvalidAction(format!(
                "action space must hold 1 to {} actions, got {}",
                ACTION_MEANINGS.len(),
                options.actions
            )));
        }

        let defaults = HashMap::from([(ACCELERATION.to_string(), game.parameter(ACCELERATION).await?)]);
        if !options.accelerate {
            game.set_parameter(ACCELERATION, 0.0).await?;
        }
        game.press(Key::Space).await?;

        // Raw frames keep the canvas size, so measure it once
        let (space, current_frame) = if options.encoding == Encoding::RawColor {
            let frame = options.encoding.encode_canvas(&game.canvas_png().await?)?;
            let shape = frame.shape();
            (options.encoding.observation_space((shape[0], shape[1])), frame)
        } else {
            let space = options.encoding.observation_space((0, 0));
            let low = space.low_observation();
            (space, low)
        };

        info!(
            encoding = ?options.encoding,
            shape = ?space.shape,
            dtype = %space.dtype,
            actions = options.actions,
            accelerate = options.accelerate,
            "environment ready"
        );

        Ok(Self {
            game,
            options,
            space,
            defaults,
            current_frame,
            lifecycle: Lifecycle::Ready,
        })
    }

    /// Current state-machine position
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Options the environment was built with
    #[must_use]
    pub fn options(&self) -> &EnvOptions {
        &self.options
    }

    /// Declared observation space
    #[must_use]
    pub fn space(&self) -> &BoxObservationSpace {
        &self.space
    }

    /// Declared action space
    #[must_use]
    pub fn discrete_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(self.options.actions)
    }

    /// Borrow the oracle
    #[must_use]
    pub fn game(&self) -> &G {
        &self.game
    }

    /// Parameter values captured at construction
    #[must_use]
    pub fn defaults(&self) -> &HashMap<String, f64> {
        &self.defaults
    }

    /// Labels of the active action set
    #[must_use]
    pub fn get_action_meanings(&self) -> Vec<&'static str> {
        ACTION_MEANINGS[..self.options.actions].to_vec()
    }

    /// Current score of the game
    pub async fn get_score(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.game.score().await?)
    }

    /// Restore the captured acceleration, or set it to zero
    pub async fn set_acceleration(&self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        if enabled {
            self.restore_parameter(ACCELERATION).await
        } else {
            Ok(self.game.set_parameter(ACCELERATION, 0.0).await?)
        }
    }

    /// Switch between `normal` and `penalization`
    pub fn set_score_mode(&mut self, mode: &str) -> Result<()> {
        self.ensure_open()?;
        self.options.reward.mode = mode.parse::<ScoreMode>()?;
        Ok(())
    }

    /// Stop the game loop
    pub async fn pause(&self) -> Result<()> {
        self.ensure_open()?;
        Ok(self.game.pause().await?)
    }

    /// Continue the game loop
    pub async fn resume(&self) -> Result<()> {
        self.ensure_open()?;
        Ok(self.game.resume().await?)
    }

    /// Whether the game loop is stopped
    pub async fn is_paused(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.game.is_paused().await?)
    }

    /// Whether a run is in progress
    pub async fn is_playing(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.game.is_playing().await?)
    }

    /// Whether night mode is active
    pub async fn is_inverted(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.game.is_inverted().await?)
    }

    async fn restore_parameter(&self, key: &str) -> Result<()> {
        let value = self
            .defaults
            .get(key)
            .copied()
            .ok_or_else(|| RLError::Environment(format!("no default captured for {key}")))?;
        Ok(self.game.set_parameter(key, value).await?)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Closed {
            Err(RLError::Closed)
        } else {
            Ok(())
        }
    }

    async fn observe(&mut self) -> Result<ArrayObservation> {
        let observation = self.options.encoding.observe(&self.game, &self.space).await?;
        debug_assert_eq!(observation.shape(), self.space.shape);
        self.current_frame = observation.clone();
        Ok(observation)
    }

    fn key_for(&self, action: DiscreteAction) -> Option<Key> {
        if action.0 >= self.options.actions {
            return None;
        }
        match action.0 {
            1 => Some(Key::Up),
            2 => Some(Key::Down),
            3 => Some(Key::Space),
            _ => None,
        }
    }
}

#[async_trait]
impl<G: DinoGame> Environment for ChromeDinoEnv<G> {
    type Observation = ArrayObservation;
    type Action = DiscreteAction;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(self.space.clone())
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        Box::new(self.discrete_space())
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.ensure_open()?;
        self.game.restart().await?;
        let observation = self.observe().await?;
        self.lifecycle = Lifecycle::Running;
        debug!("episode reset");
        Ok((observation, StepInfo::default()))
    }

    async fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>> {
        self.ensure_open()?;

        if let Some(key) = self.key_for(action) {
            self.game.press(key).await?;
        }

        let observation = self.observe().await?;
        let score = self.game.score().await?;
        let done = self.game.is_crashed().await?;
        let reward = self.options.reward.reward(done, score);

        let mut info = StepInfo::default();
        info.insert("score", score);
        if self.options.preview {
            let preview = Encoding::Grayscale { normalize: true }.encode_canvas(&self.game.canvas_png().await?)?;
            info.insert("preview", serde_json::to_value(&preview)?);
        }

        if done {
            self.lifecycle = Lifecycle::Crashed;
            debug!(score, "crashed");
            if self.options.restart_on_crash {
                self.game.restart().await?;
            }
        } else {
            self.lifecycle = Lifecycle::Running;
        }

        Ok(Step {
            observation,
            reward,
            done,
            truncated: false,
            info,
        })
    }

    async fn render(&self, mode: RenderMode) -> Result<Self::Observation> {
        assert!(mode == RenderMode::RgbArray, "Only supports rgb_array mode.");
        self.ensure_open()?;
        Ok(self.current_frame.clone())
    }

    async fn close(&mut self) -> Result<()> {
        if self.lifecycle == Lifecycle::Closed {
            return Ok(());
        }
        self.lifecycle = Lifecycle::Closed;
        info!("environment closed");
        Ok(self.game.close().await?)
    }
}
