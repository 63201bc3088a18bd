//! Reward and termination policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use dino_rl_core::Reward;

use crate::error::DinoError;

/// How rewards are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// The running score is the reward, crash included
    Normal,
    /// Fixed reward per surviving step, fixed penalty on crash
    #[default]
    Penalization,
}

impl fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Penalization => f.write_str("penalization"),
        }
    }
}

impl FromStr for ScoreMode {
    type Err = DinoError;

    fn from_str(s: &str) -> Result<Self, DinoError> {
        match s {
            "normal" => Ok(Self::Normal),
            "penalization" => Ok(Self::Penalization),
            other => Err(DinoError::UnsupportedScoreMode(other.to_string())),
        }
    }
}

/// Reward assignment for one environment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardPolicy {
    /// Reward for every step that did not crash
    pub gametime_reward: f64,
    /// Reward for the crashing step
    pub gameover_penalty: f64,
    /// Active mode
    pub mode: ScoreMode,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            gametime_reward: 0.1,
            gameover_penalty: -1.0,
            mode: ScoreMode::Penalization,
        }
    }
}

impl RewardPolicy {
    /// Reward for a step given the crash flag and the score read after acting
    #[must_use]
    pub fn reward(&self, crashed: bool, score: u64) -> Reward {
        match self.mode {
            ScoreMode::Normal => Reward(score as f64),
            ScoreMode::Penalization if crashed => Reward(self.gameover_penalty),
            ScoreMode::Penalization => Reward(self.gametime_reward),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalization() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.reward(false, 500), Reward(0.1));
        assert_eq!(policy.reward(true, 500), Reward(-1.0));
    }

    #[test]
    fn test_normal_uses_score_even_on_crash() {
        let policy = RewardPolicy { mode: ScoreMode::Normal, ..RewardPolicy::default() };
        assert_eq!(policy.reward(false, 42), Reward(42.0));
        assert_eq!(policy.reward(true, 42), Reward(42.0));
    }

    #[test]
    fn test_score_mode_parsing() {
        assert_eq!("normal".parse::<ScoreMode>().unwrap(), ScoreMode::Normal);
        assert_eq!("penalization".parse::<ScoreMode>().unwrap(), ScoreMode::Penalization);
        let err = "bonus".parse::<ScoreMode>().unwrap_err();
        assert!(err.to_string().contains("'normal' or 'penalization'"));
    }
}
