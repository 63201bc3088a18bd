//! Observation encodings
//!
//! An [`Encoding`] decides both the declared observation space and how a
//! fresh observation is sampled from the game.

use dino_rl_core::{ArrayObservation, BoxObservationSpace, Dtype};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DinoError, Result};
use crate::image_ops;
use crate::oracle::DinoGame;

/// Side of the square grayscale frame
pub const FRAME_SIZE: u32 = 80;
/// Rows kept from the top of the canvas before resizing
pub const ROI_HEIGHT: u32 = 300;
/// Columns kept from the left of the canvas before resizing
pub const ROI_WIDTH: u32 = 500;

//   dino_x  dino_y  obs_dx  obs_dy  obs_w  obs_h  speed
const ONE_OBSTACLE_LOW: [f64; 7] = [0.0, 0.0, -20.0, -20.0, 0.0, 0.0, 0.0];
const ONE_OBSTACLE_HIGH: [f64; 7] = [600.0, 150.0, 600.0, 150.0, 600.0, 150.0, 100.0];

//   dino_x  dino_y  1st dx/dy/w/h  2nd dx/dy/w/h  speed
const TWO_OBSTACLE_LOW: [f64; 11] = [0.0, 0.0, -20.0, -20.0, 0.0, 0.0, -20.0, -20.0, 0.0, 0.0, 0.0];
const TWO_OBSTACLE_HIGH: [f64; 11] =
    [600.0, 150.0, 600.0, 150.0, 600.0, 150.0, 600.0, 150.0, 200.0, 100.0, 100.0];

/// How many obstacles the feature vector describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Nearest obstacle only, 7 features
    OneObstacle,
    /// Two nearest obstacles, 11 features
    TwoObstacle,
}

impl InputMode {
    /// Number of obstacles encoded
    #[must_use]
    pub fn obstacles(self) -> usize {
        match self {
            Self::OneObstacle => 1,
            Self::TwoObstacle => 2,
        }
    }

    /// Length of the feature vector
    #[must_use]
    pub fn len(self) -> usize {
        3 + 4 * self.obstacles()
    }

    /// Declared bounds of the raw features
    #[must_use]
    pub fn bounds(self) -> (Vec<f64>, Vec<f64>) {
        match self {
            Self::OneObstacle => (ONE_OBSTACLE_LOW.to_vec(), ONE_OBSTACLE_HIGH.to_vec()),
            Self::TwoObstacle => (TWO_OBSTACLE_LOW.to_vec(), TWO_OBSTACLE_HIGH.to_vec()),
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneObstacle => f.write_str("one_obstacle"),
            Self::TwoObstacle => f.write_str("two_obstacle"),
        }
    }
}

impl FromStr for InputMode {
    type Err = DinoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "one_obstacle" => Ok(Self::OneObstacle),
            "two_obstacle" => Ok(Self::TwoObstacle),
            other => Err(DinoError::UnsupportedInputMode(other.to_string())),
        }
    }
}

/// Observation encoding, fixed for the lifetime of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoding {
    /// Cropped, resized grayscale canvas
    Grayscale {
        /// `f32` in `[0, 1]` with shape `[80, 80]`, else `u8` with shape `[80, 80, 1]`
        normalize: bool,
    },
    /// Full-size RGB canvas, `u8` `[H, W, 3]`
    RawColor,
    /// Numeric features of the dino and the nearest obstacle(s)
    Features {
        /// One or two obstacles
        mode: InputMode,
        /// Divide every component by the midpoint of its bounds
        normalize: bool,
    },
}

impl Encoding {
    /// Whether observations come from the canvas
    #[must_use]
    pub fn is_pixels(&self) -> bool {
        matches!(self, Self::Grayscale { .. } | Self::RawColor)
    }

    /// Declared observation space.
    ///
    /// `canvas` is the `(height, width)` of the canvas and is only consulted by
    /// [`Encoding::RawColor`].
    #[must_use]
    pub fn observation_space(&self, canvas: (usize, usize)) -> BoxObservationSpace {
        let size = FRAME_SIZE as usize;
        match *self {
            Self::Grayscale { normalize: true } => {
                BoxObservationSpace::uniform(0.0, 1.0, vec![size, size], Dtype::F32)
            }
            Self::Grayscale { normalize: false } => {
                BoxObservationSpace::uniform(0.0, 255.0, vec![size, size, 1], Dtype::U8)
            }
            Self::RawColor => {
                BoxObservationSpace::uniform(0.0, 255.0, vec![canvas.0, canvas.1, 3], Dtype::U8)
            }
            Self::Features { mode, .. } => {
                let (low, high) = mode.bounds();
                BoxObservationSpace {
                    shape: vec![low.len()],
                    low,
                    high,
                    dtype: Dtype::F32,
                }
            }
        }
    }

    /// Sample a fresh observation from the game
    pub async fn observe<G>(&self, game: &G, space: &BoxObservationSpace) -> Result<ArrayObservation>
    where
        G: DinoGame + ?Sized,
    {
        match *self {
            Self::Grayscale { .. } | Self::RawColor => {
                let png = game.canvas_png().await?;
                self.encode_canvas(&png)
            }
            Self::Features { mode, normalize } => {
                let raw = feature_values(game, mode).await?;
                let values = if normalize {
                    normalize_features(&raw, space)
                } else {
                    clamp_features(&raw, space)
                };
                Ok(ArrayObservation::F32(Array1::from(values).into_dyn()))
            }
        }
    }

    /// Run the pixel pipeline on a PNG snapshot.
    ///
    /// Feature encodings have no pixel form and fall back to the normalised
    /// grayscale frame.
    pub fn encode_canvas(&self, png: &[u8]) -> Result<ArrayObservation> {
        let rgb = image_ops::decode_canvas(png)?;
        if matches!(self, Self::RawColor) {
            return Ok(ArrayObservation::U8(image_ops::rgb_to_u8(&rgb).into_dyn()));
        }

        let gray = image_ops::grayscale(&rgb);
        let roi = image_ops::crop_top_left(&gray, ROI_HEIGHT, ROI_WIDTH);
        let frame = image_ops::resize(&roi, FRAME_SIZE, FRAME_SIZE);

        Ok(match self {
            Self::Grayscale { normalize: false } => {
                ArrayObservation::U8(image_ops::gray_to_u8(&frame).into_dyn())
            }
            _ => ArrayObservation::F32(image_ops::gray_to_unit(&frame).into_dyn()),
        })
    }
}

/// Raw feature values in declaration order:
/// dino x, dino y, then x/y distance, width, height per obstacle, then speed
pub async fn feature_values<G>(game: &G, mode: InputMode) -> Result<Vec<f64>>
where
    G: DinoGame + ?Sized,
{
    let mut values = Vec::with_capacity(mode.len());
    values.push(game.dino_x().await?);
    values.push(game.dino_y().await?);
    for n in 1..=mode.obstacles() {
        values.push(game.obstacle_x_distance(n).await?);
        values.push(game.obstacle_y_distance(n).await?);
        values.push(game.obstacle_width(n).await?);
        values.push(game.obstacle_height(n).await?);
    }
    values.push(game.speed().await?);
    Ok(values)
}

/// Divide each component by the midpoint of its declared bounds
#[must_use]
pub fn normalize_features(raw: &[f64], space: &BoxObservationSpace) -> Vec<f32> {
    raw.iter()
        .enumerate()
        .map(|(i, &value)| {
            let mid = space.midpoint(i);
            if mid == 0.0 { value as f32 } else { (value / mid) as f32 }
        })
        .collect()
}

/// Clamp each raw component into its declared bounds.
///
/// Obstacles keep being reported for a few frames after scrolling past the
/// dino, which drives the distances below the declared lower bound.
#[must_use]
pub fn clamp_features(raw: &[f64], space: &BoxObservationSpace) -> Vec<f32> {
    raw.iter()
        .enumerate()
        .map(|(i, &value)| value.clamp(space.low[i], space.high[i]) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{ScriptedGame, ScriptedObstacle};
    use approx::assert_relative_eq;
    use dino_rl_core::{Observation, ObservationSpace};
    use proptest::prelude::*;

    fn one_obstacle_space() -> BoxObservationSpace {
        Encoding::Features { mode: InputMode::OneObstacle, normalize: true }.observation_space((0, 0))
    }

    #[test]
    fn test_input_mode_parsing() {
        assert_eq!("one_obstacle".parse::<InputMode>().unwrap(), InputMode::OneObstacle);
        assert_eq!("two_obstacle".parse::<InputMode>().unwrap(), InputMode::TwoObstacle);

        let err = "three_obstacle".parse::<InputMode>().unwrap_err();
        assert!(matches!(err, DinoError::UnsupportedInputMode(ref m) if m == "three_obstacle"));
        assert!(err.to_string().contains("'one_obstacle' or 'two_obstacle'"));
    }

    #[test]
    fn test_declared_spaces() {
        let gray = Encoding::Grayscale { normalize: false }.observation_space((150, 600));
        assert_eq!(gray.shape, vec![80, 80, 1]);
        assert_eq!(gray.dtype, Dtype::U8);

        let unit = Encoding::Grayscale { normalize: true }.observation_space((150, 600));
        assert_eq!(unit.shape, vec![80, 80]);
        assert_eq!(unit.dtype, Dtype::F32);

        let raw = Encoding::RawColor.observation_space((150, 600));
        assert_eq!(raw.shape, vec![150, 600, 3]);

        let two = Encoding::Features { mode: InputMode::TwoObstacle, normalize: true }
            .observation_space((0, 0));
        assert_eq!(two.shape, vec![11]);
        assert_eq!(two.low.len(), 11);
    }

    #[test]
    fn test_dino_x_midpoint_normalisation() {
        let space = one_obstacle_space();
        let normalized = normalize_features(&[300.0, 75.0, 290.0, 65.0, 300.0, 75.0, 50.0], &space);
        for value in normalized {
            assert_relative_eq!(value, 1.0);
        }
    }

    proptest! {
        #[test]
        fn prop_normalised_component_is_raw_over_midpoint(
            raw in proptest::collection::vec(-20.0f64..600.0, 7)
        ) {
            let space = one_obstacle_space();
            let normalized = normalize_features(&raw, &space);
            for (i, value) in normalized.iter().enumerate() {
                let expected = (raw[i] / ((space.low[i] + space.high[i]) / 2.0)) as f32;
                prop_assert!((value - expected).abs() <= f32::EPSILON * expected.abs().max(1.0));
            }
        }
    }

    #[tokio::test]
    async fn test_two_obstacles_reads_second_obstacle() {
        let game = ScriptedGame::new()
            .with_dino(50.0, 90.0)
            .with_speed(10.0)
            .with_obstacles(vec![
                ScriptedObstacle { x: 150.0, y: 100.0, width: 17.0, height: 35.0 },
                ScriptedObstacle { x: 400.0, y: 75.0, width: 46.0, height: 40.0 },
            ]);

        let values = feature_values(&game, InputMode::TwoObstacle).await.unwrap();
        assert_eq!(
            values,
            vec![50.0, 90.0, 100.0, 10.0, 17.0, 35.0, 350.0, -15.0, 46.0, 40.0, 10.0]
        );
    }

    #[tokio::test]
    async fn test_raw_features_stay_in_bounds_when_obstacle_passed_dino() {
        let game = ScriptedGame::new()
            .with_dino(50.0, 93.0)
            .with_obstacles(vec![ScriptedObstacle { x: -20.0, y: 105.0, width: 17.0, height: 35.0 }]);
        let encoding = Encoding::Features { mode: InputMode::OneObstacle, normalize: false };
        let space = encoding.observation_space((0, 0));

        let obs = encoding.observe(&game, &space).await.unwrap();
        let values = obs.to_vec();
        assert_relative_eq!(values[0], 50.0);
        assert_relative_eq!(values[2], -20.0);
        assert!(space.contains(&obs));
    }

    #[tokio::test]
    async fn test_missing_obstacle_uses_fallbacks() {
        let game = ScriptedGame::new().with_dino(50.0, 93.0);
        let values = feature_values(&game, InputMode::OneObstacle).await.unwrap();
        assert_eq!(values[2], 550.0);
        assert_eq!(values[3], 57.0);
        assert_eq!(values[4], 0.0);
        assert_eq!(values[5], 0.0);
    }

    #[tokio::test]
    async fn test_pixel_observations_match_their_spaces() {
        let game = ScriptedGame::new();
        for encoding in [
            Encoding::Grayscale { normalize: true },
            Encoding::Grayscale { normalize: false },
            Encoding::RawColor,
        ] {
            let space = encoding.observation_space((150, 600));
            let obs = encoding.observe(&game, &space).await.unwrap();
            assert!(space.contains(&obs), "{encoding:?} produced {:?}", obs.shape());
        }
    }

    #[tokio::test]
    async fn test_grayscale_frame_has_dark_dino_on_white() {
        let game = ScriptedGame::new();
        let encoding = Encoding::Grayscale { normalize: false };
        let space = encoding.observation_space((150, 600));
        let obs = encoding.observe(&game, &space).await.unwrap();
        let frame = obs.as_u8().unwrap();

        // top-left corner is background, the dino sits around x 50..94, y 93..140
        assert_eq!(frame[[0, 0, 0]], 255);
        let dino_row = (115.0 / 150.0 * 80.0) as usize;
        let dino_col = (70.0 / 500.0 * 80.0) as usize;
        assert!(frame[[dino_row, dino_col, 0]] < 128);
    }

}
