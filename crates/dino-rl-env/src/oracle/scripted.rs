//! Deterministic in-memory oracle
//!
//! `ScriptedGame` keeps its state behind an `Arc`, so a clone handed to an
//! environment can still be inspected and steered from the outside.

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DinoGame, Key, ACCELERATION, NO_OBSTACLE_X, NO_OBSTACLE_Y};
use crate::error::Result;

/// Canvas size of the real game
pub const CANVAS_WIDTH: u32 = 600;
/// Canvas size of the real game
pub const CANVAS_HEIGHT: u32 = 150;

const INK: Rgba<u8> = Rgba([83, 83, 83, 255]);
const DINO_SIZE: (f64, f64) = (44.0, 47.0);

/// Commands received by a [`ScriptedGame`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `restart()`
    Restart,
    /// `pause()`
    Pause,
    /// `resume()`
    Resume,
    /// `press(key)`
    Press(Key),
    /// `set_parameter(key, value)`
    SetParameter(String, f64),
    /// `close()`
    Close,
}

/// An obstacle placed on the scripted track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedObstacle {
    /// Absolute x position
    pub x: f64,
    /// Absolute y position
    pub y: f64,
    /// Sprite width
    pub width: f64,
    /// Sprite height
    pub height: f64,
}

#[derive(Debug)]
struct State {
    crashed: bool,
    paused: bool,
    playing: bool,
    inverted: bool,
    score: u64,
    dino: (f64, f64),
    obstacles: Vec<ScriptedObstacle>,
    speed: f64,
    parameters: HashMap<String, f64>,
    crash_after: Option<usize>,
    polls: usize,
    journal: Vec<Command>,
    queries: usize,
    closed: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            crashed: false,
            paused: false,
            playing: false,
            inverted: false,
            score: 0,
            dino: (50.0, 93.0),
            obstacles: Vec::new(),
            speed: 6.0,
            parameters: HashMap::from([(ACCELERATION.to_string(), 0.001)]),
            crash_after: None,
            polls: 0,
            journal: Vec::new(),
            queries: 0,
            closed: false,
        }
    }
}

/// Oracle that plays back a fixed scene.
///
/// Every crash poll counts as one game tick: the score grows by one and,
/// once `crash_after` ticks have elapsed since the last restart, the dino
/// crashes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGame {
    state: Arc<Mutex<State>>,
}

impl ScriptedGame {
    /// Empty track, no scheduled crash
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Crash after `ticks` crash polls
    #[must_use]
    pub fn with_crash_after(self, ticks: usize) -> Self {
        self.state().crash_after = Some(ticks);
        self
    }

    /// Place obstacles, nearest first
    #[must_use]
    pub fn with_obstacles(self, obstacles: Vec<ScriptedObstacle>) -> Self {
        self.state().obstacles = obstacles;
        self
    }

    /// Put the dino at `(x, y)`
    #[must_use]
    pub fn with_dino(self, x: f64, y: f64) -> Self {
        self.state().dino = (x, y);
        self
    }

    /// Set the scroll speed
    #[must_use]
    pub fn with_speed(self, speed: f64) -> Self {
        self.state().speed = speed;
        self
    }

    /// Set a `Runner` parameter's initial value
    #[must_use]
    pub fn with_parameter(self, key: &str, value: f64) -> Self {
        self.state().parameters.insert(key.to_string(), value);
        self
    }

    /// Force the crash flag
    pub fn set_crashed(&self, crashed: bool) {
        self.state().crashed = crashed;
    }

    /// Force the score
    pub fn set_score(&self, score: u64) {
        self.state().score = score;
    }

    /// Move the dino
    pub fn set_dino(&self, x: f64, y: f64) {
        self.state().dino = (x, y);
    }

    /// Commands received so far
    #[must_use]
    pub fn journal(&self) -> Vec<Command> {
        self.state().journal.clone()
    }

    /// Commands plus queries received so far
    #[must_use]
    pub fn interactions(&self) -> usize {
        let state = self.state();
        state.journal.len() + state.queries
    }

    /// Current value of a `Runner` parameter
    #[must_use]
    pub fn parameter_value(&self, key: &str) -> Option<f64> {
        self.state().parameters.get(key).copied()
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query<T>(&self, read: impl FnOnce(&State) -> T) -> T {
        let mut state = self.state();
        state.queries += 1;
        read(&state)
    }

    fn record(&self, command: Command) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.journal.push(command);
        state
    }

    fn obstacle(&self, n: usize) -> Option<ScriptedObstacle> {
        self.query(|s| n.checked_sub(1).and_then(|i| s.obstacles.get(i)).copied())
    }
}

fn fill(canvas: &mut RgbaImage, x: f64, y: f64, width: f64, height: f64) {
    let clamp_x = |v: f64| v.clamp(0.0, f64::from(CANVAS_WIDTH)) as u32;
    let clamp_y = |v: f64| v.clamp(0.0, f64::from(CANVAS_HEIGHT)) as u32;
    for py in clamp_y(y)..clamp_y(y + height) {
        for px in clamp_x(x)..clamp_x(x + width) {
            canvas.put_pixel(px, py, INK);
        }
    }
}

#[async_trait]
impl DinoGame for ScriptedGame {
    async fn restart(&self) -> Result<()> {
        let mut state = self.record(Command::Restart);
        state.crashed = false;
        state.playing = true;
        state.paused = false;
        state.score = 0;
        state.polls = 0;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(Command::Pause).paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record(Command::Resume).paused = false;
        Ok(())
    }

    async fn is_crashed(&self) -> Result<bool> {
        let mut state = self.state();
        state.queries += 1;
        if !state.crashed {
            state.polls += 1;
            state.score += 1;
            if state.crash_after.is_some_and(|limit| state.polls >= limit) {
                state.crashed = true;
                state.playing = false;
            }
        }
        Ok(state.crashed)
    }

    async fn is_paused(&self) -> Result<bool> {
        Ok(self.query(|s| s.paused))
    }

    async fn is_playing(&self) -> Result<bool> {
        Ok(self.query(|s| s.playing))
    }

    async fn is_inverted(&self) -> Result<bool> {
        Ok(self.query(|s| s.inverted))
    }

    async fn press(&self, key: Key) -> Result<()> {
        let mut state = self.record(Command::Press(key));
        if !state.playing && !state.crashed {
            state.playing = true;
        }
        Ok(())
    }

    async fn score(&self) -> Result<u64> {
        Ok(self.query(|s| s.score))
    }

    async fn dino_x(&self) -> Result<f64> {
        Ok(self.query(|s| s.dino.0))
    }

    async fn dino_y(&self) -> Result<f64> {
        Ok(self.query(|s| s.dino.1))
    }

    async fn obstacle_width(&self, n: usize) -> Result<f64> {
        Ok(self.obstacle(n).map_or(0.0, |o| o.width))
    }

    async fn obstacle_height(&self, n: usize) -> Result<f64> {
        Ok(self.obstacle(n).map_or(0.0, |o| o.height))
    }

    async fn obstacle_x(&self, n: usize) -> Result<f64> {
        Ok(self.obstacle(n).map_or(NO_OBSTACLE_X, |o| o.x))
    }

    async fn obstacle_y(&self, n: usize) -> Result<f64> {
        Ok(self.obstacle(n).map_or(NO_OBSTACLE_Y, |o| o.y))
    }

    async fn speed(&self) -> Result<f64> {
        Ok(self.query(|s| s.speed))
    }

    async fn canvas_png(&self) -> Result<Vec<u8>> {
        let (dino, obstacles) = self.query(|s| (s.dino, s.obstacles.clone()));

        // Transparent background, like the real canvas
        let mut canvas = RgbaImage::new(CANVAS_WIDTH, CANVAS_HEIGHT);
        fill(&mut canvas, dino.0, dino.1, DINO_SIZE.0, DINO_SIZE.1);
        for o in &obstacles {
            fill(&mut canvas, o.x, o.y, o.width, o.height);
        }

        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
        Ok(png)
    }

    async fn parameter(&self, key: &str) -> Result<f64> {
        Ok(self.query(|s| s.parameters.get(key).copied().unwrap_or(0.0)))
    }

    async fn set_parameter(&self, key: &str, value: f64) -> Result<()> {
        self.record(Command::SetParameter(key.to_string(), value))
            .parameters
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.record(Command::Close).closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crash_after_ticks_and_restart() {
        let game = ScriptedGame::new().with_crash_after(3);

        assert!(!game.is_crashed().await.unwrap());
        assert!(!game.is_crashed().await.unwrap());
        assert!(game.is_crashed().await.unwrap());
        assert!(game.is_crashed().await.unwrap());
        assert_eq!(game.score().await.unwrap(), 3);

        game.restart().await.unwrap();
        assert!(!game.is_crashed().await.unwrap());
        assert_eq!(game.score().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_obstacle_fallbacks() {
        let game = ScriptedGame::new()
            .with_dino(50.0, 90.0)
            .with_obstacles(vec![ScriptedObstacle { x: 250.0, y: 100.0, width: 17.0, height: 35.0 }]);

        assert_eq!(game.obstacle_x_distance(1).await.unwrap(), 200.0);
        assert_eq!(game.obstacle_y_distance(1).await.unwrap(), 10.0);
        assert_eq!(game.obstacle_width(1).await.unwrap(), 17.0);

        assert_eq!(game.obstacle_x(2).await.unwrap(), NO_OBSTACLE_X);
        assert_eq!(game.obstacle_y(2).await.unwrap(), NO_OBSTACLE_Y);
        assert_eq!(game.obstacle_height(2).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let game = ScriptedGame::new();
        let mut handle = game.clone();

        handle.press(Key::Up).await.unwrap();
        handle.set_parameter(ACCELERATION, 0.0).await.unwrap();
        handle.close().await.unwrap();

        assert_eq!(
            game.journal(),
            vec![
                Command::Press(Key::Up),
                Command::SetParameter(ACCELERATION.to_string(), 0.0),
                Command::Close,
            ]
        );
        assert_eq!(game.parameter_value(ACCELERATION), Some(0.0));
        assert!(game.is_closed());
    }

    #[tokio::test]
    async fn test_canvas_is_png_with_transparent_background() {
        let game = ScriptedGame::new();
        let png = game.canvas_png().await.unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();

        assert_eq!(decoded.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert_eq!(*decoded.get_pixel(60, 100), INK);
    }
}
