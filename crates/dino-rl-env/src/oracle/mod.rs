//! The game oracle: the externally controlled runner game
//!
//! [`DinoGame`] is the full control surface the environments use. The
//! browser-backed implementation lives in [`webdriver`]; [`scripted`] is a
//! deterministic in-memory stand-in.

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

pub mod driver;
pub mod scripted;
pub mod webdriver;

pub use scripted::{ScriptedGame, ScriptedObstacle};
pub use webdriver::WebDriverGame;

/// The only tunable parameter the environments touch
pub const ACCELERATION: &str = "config.ACCELERATION";

/// Obstacle x position reported when no such obstacle exists
pub const NO_OBSTACLE_X: f64 = 600.0;
/// Obstacle y position reported when no such obstacle exists
pub const NO_OBSTACLE_Y: f64 = 150.0;

/// Keys the game reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Start / jump
    Space,
    /// Jump
    Up,
    /// Duck
    Down,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Space => f.write_str("space"),
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// Query and command surface of the running game.
///
/// Obstacle accessors take a 1-based rank `n` (1 is the nearest obstacle) and
/// fall back to [`NO_OBSTACLE_X`], [`NO_OBSTACLE_Y`] or `0` when fewer than `n`
/// obstacles are on screen. Every call is a full round-trip; nothing is cached.
#[async_trait]
pub trait DinoGame: Send + Sync {
    /// Start a new run
    async fn restart(&self) -> Result<()>;

    /// Stop the game loop
    async fn pause(&self) -> Result<()>;

    /// Continue the game loop
    async fn resume(&self) -> Result<()>;

    /// Whether the dino hit an obstacle
    async fn is_crashed(&self) -> Result<bool>;

    /// Whether the game loop is stopped
    async fn is_paused(&self) -> Result<bool>;

    /// Whether a run is in progress
    async fn is_playing(&self) -> Result<bool>;

    /// Whether night mode colours are active
    async fn is_inverted(&self) -> Result<bool>;

    /// Send a single key press to the page
    async fn press(&self, key: Key) -> Result<()>;

    /// Current distance-meter reading
    async fn score(&self) -> Result<u64>;

    /// Dino x position
    async fn dino_x(&self) -> Result<f64>;

    /// Dino y position
    async fn dino_y(&self) -> Result<f64>;

    /// Width of the `n`-th nearest obstacle, `0` if absent
    async fn obstacle_width(&self, n: usize) -> Result<f64>;

    /// Height of the `n`-th nearest obstacle, `0` if absent
    async fn obstacle_height(&self, n: usize) -> Result<f64>;

    /// Absolute x position of the `n`-th nearest obstacle
    async fn obstacle_x(&self, n: usize) -> Result<f64>;

    /// Absolute y position of the `n`-th nearest obstacle
    async fn obstacle_y(&self, n: usize) -> Result<f64>;

    /// Horizontal distance from the dino to the `n`-th nearest obstacle
    async fn obstacle_x_distance(&self, n: usize) -> Result<f64> {
        let obstacle = self.obstacle_x(n).await?;
        Ok(obstacle - self.dino_x().await?)
    }

    /// Vertical distance from the dino to the `n`-th nearest obstacle
    async fn obstacle_y_distance(&self, n: usize) -> Result<f64> {
        let obstacle = self.obstacle_y(n).await?;
        Ok(obstacle - self.dino_y().await?)
    }

    /// Current scroll speed
    async fn speed(&self) -> Result<f64>;

    /// PNG snapshot of the game canvas
    async fn canvas_png(&self) -> Result<Vec<u8>>;

    /// Read a numeric `Runner` parameter such as [`ACCELERATION`]
    async fn parameter(&self, key: &str) -> Result<f64>;

    /// Write a numeric `Runner` parameter
    async fn set_parameter(&self, key: &str, value: f64) -> Result<()>;

    /// Release the browser
    async fn close(&mut self) -> Result<()>;
}
