//! Observation representations and observation spaces

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Trait for observations from an environment
pub trait Observation: Clone + Debug + Send + Sync {
    /// Convert observation to a feature vector
    fn to_vec(&self) -> Vec<f64>;

    /// Get the shape of the observation
    fn shape(&self) -> Vec<usize>;
}

/// Trait for defining observation spaces
pub trait ObservationSpace: Send + Sync {
    /// The type of observations in this space
    type Observation: Observation;

    /// Sample a random observation from the space
    fn sample(&self) -> Self::Observation;

    /// Check if an observation is valid within this space
    fn contains(&self, obs: &Self::Observation) -> bool;

    /// Get the shape of observations in this space
    fn shape(&self) -> Vec<usize>;
}

/// Element type of an array observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// Unsigned 8-bit integers, `[0, 255]`
    U8,
    /// 32-bit floats
    F32,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => f.write_str("uint8"),
            Self::F32 => f.write_str("float32"),
        }
    }
}

/// N-dimensional array observation with a fixed element type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayObservation {
    /// Integer pixels
    U8(ArrayD<u8>),
    /// Floating point values (scaled pixels or feature vectors)
    F32(ArrayD<f32>),
}

impl ArrayObservation {
    /// Element type of this observation
    #[must_use]
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::U8(_) => Dtype::U8,
            Self::F32(_) => Dtype::F32,
        }
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(a) => a.len(),
            Self::F32(a) => a.len(),
        }
    }

    /// Whether the observation holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the integer array, if this is one
    #[must_use]
    pub fn as_u8(&self) -> Option<&ArrayD<u8>> {
        match self {
            Self::U8(a) => Some(a),
            Self::F32(_) => None,
        }
    }

    /// Borrow the float array, if this is one
    #[must_use]
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::F32(a) => Some(a),
            Self::U8(_) => None,
        }
    }
}

impl Observation for ArrayObservation {
    fn to_vec(&self) -> Vec<f64> {
        match self {
            Self::U8(a) => a.iter().map(|&v| f64::from(v)).collect(),
            Self::F32(a) => a.iter().map(|&v| f64::from(v)).collect(),
        }
    }

    fn shape(&self) -> Vec<usize> {
        match self {
            Self::U8(a) => a.shape().to_vec(),
            Self::F32(a) => a.shape().to_vec(),
        }
    }
}

/// Box observation space with per-element bounds and a fixed dtype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxObservationSpace {
    /// Lower bounds (row-major, one per element)
    pub low: Vec<f64>,
    /// Upper bounds (row-major, one per element)
    pub high: Vec<f64>,
    /// Shape of observations
    pub shape: Vec<usize>,
    /// Element type
    pub dtype: Dtype,
}

impl BoxObservationSpace {
    /// Create a new box observation space
    pub fn new(low: Vec<f64>, high: Vec<f64>, shape: Vec<usize>, dtype: Dtype) -> crate::Result<Self> {
        let total_size: usize = shape.iter().product();
        if low.len() != total_size {
            return Err(crate::RLError::DimensionMismatch {
                expected: total_size,
                actual: low.len(),
            });
        }
        if high.len() != total_size {
            return Err(crate::RLError::DimensionMismatch {
                expected: total_size,
                actual: high.len(),
            });
        }
        Ok(Self { low, high, shape, dtype })
    }

    /// Space where every element shares the same bounds
    #[must_use]
    pub fn uniform(low: f64, high: f64, shape: Vec<usize>, dtype: Dtype) -> Self {
        let total_size: usize = shape.iter().product();
        Self {
            low: vec![low; total_size],
            high: vec![high; total_size],
            shape,
            dtype,
        }
    }

    /// Midpoint of the bounds of element `i`
    #[must_use]
    pub fn midpoint(&self, i: usize) -> f64 {
        (self.low[i] + self.high[i]) / 2.0
    }

    /// Observation filled with the lower bounds
    #[must_use]
    pub fn low_observation(&self) -> ArrayObservation {
        self.build(self.low.clone())
    }

    fn build(&self, data: Vec<f64>) -> ArrayObservation {
        let shape = IxDyn(&self.shape);
        // Filled in row-major order; missing bounds read as zero
        let mut values = data.into_iter();
        match self.dtype {
            Dtype::U8 => ArrayObservation::U8(ArrayD::from_shape_fn(shape, |_| {
                values.next().unwrap_or_default() as u8
            })),
            Dtype::F32 => ArrayObservation::F32(ArrayD::from_shape_fn(shape, |_| {
                values.next().unwrap_or_default() as f32
            })),
        }
    }
}

impl ObservationSpace for BoxObservationSpace {
    type Observation = ArrayObservation;

    fn sample(&self) -> Self::Observation {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let data: Vec<f64> = self.low.iter()
            .zip(&self.high)
            .map(|(l, h)| rng.gen_range(*l..=*h))
            .collect();

        self.build(data)
    }

    fn contains(&self, obs: &Self::Observation) -> bool {
        obs.dtype() == self.dtype &&
        obs.shape() == self.shape &&
        obs.to_vec().iter()
            .zip(&self.low)
            .zip(&self.high)
            .all(|((x, l), h)| x >= l && x <= h)
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array3};

    #[test]
    fn test_contains_checks_dtype_shape_and_bounds() {
        let space = BoxObservationSpace::new(
            vec![0.0, -1.0],
            vec![1.0, 1.0],
            vec![2],
            Dtype::F32,
        ).unwrap();

        let inside = ArrayObservation::F32(arr1(&[0.5_f32, -1.0]).into_dyn());
        let outside = ArrayObservation::F32(arr1(&[1.5_f32, 0.0]).into_dyn());
        let wrong_dtype = ArrayObservation::U8(arr1(&[0_u8, 0]).into_dyn());
        let wrong_shape = ArrayObservation::F32(arr1(&[0.5_f32]).into_dyn());

        assert!(space.contains(&inside));
        assert!(!space.contains(&outside));
        assert!(!space.contains(&wrong_dtype));
        assert!(!space.contains(&wrong_shape));
    }

    #[test]
    fn test_new_rejects_mismatched_bounds() {
        let err = BoxObservationSpace::new(vec![0.0; 3], vec![1.0; 4], vec![4], Dtype::U8).unwrap_err();
        assert!(matches!(err, crate::RLError::DimensionMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_samples_and_low_are_members() {
        let space = BoxObservationSpace::uniform(0.0, 255.0, vec![4, 4, 1], Dtype::U8);
        for _ in 0..20 {
            assert!(space.contains(&space.sample()));
        }
        let low = space.low_observation();
        assert!(space.contains(&low));
        assert_eq!(low, ArrayObservation::U8(Array3::<u8>::zeros((4, 4, 1)).into_dyn()));
    }

    #[test]
    fn test_midpoint() {
        let space = BoxObservationSpace::new(vec![-20.0], vec![600.0], vec![1], Dtype::F32).unwrap();
        approx::assert_relative_eq!(space.midpoint(0), 290.0);
    }
}
