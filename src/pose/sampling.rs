//! Discrete sampling of angles and scales for pose enumeration.

use crate::util::{ShapeMatchError, ShapeMatchResult};
use serde::{Deserialize, Serialize};

/// Tolerance for including a range's upper endpoint.
const ENDPOINT_EPS: f32 = 1e-4;

/// Set of values along one pose axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// A single value.
    Fixed(f32),
    /// An explicit list, used in the given order.
    List(Vec<f32>),
    /// `min, min + step, ...` up to and including `max`.
    Range {
        /// First value.
        min: f32,
        /// Last value (inclusive).
        max: f32,
        /// Positive increment.
        step: f32,
    },
}

impl Sampling {
    /// Creates an inclusive range sampling.
    pub fn range(min: f32, max: f32, step: f32) -> Self {
        Sampling::Range { min, max, step }
    }

    /// Checks that the sampling yields at least one finite value.
    pub fn validate(&self) -> ShapeMatchResult<()> {
        match self {
            Sampling::Fixed(value) => {
                if !value.is_finite() {
                    return Err(ShapeMatchError::InvalidSampling {
                        reason: "non-finite value",
                    });
                }
            }
            Sampling::List(values) => {
                if values.is_empty() {
                    return Err(ShapeMatchError::InvalidSampling {
                        reason: "empty value list",
                    });
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(ShapeMatchError::InvalidSampling {
                        reason: "non-finite value",
                    });
                }
            }
            Sampling::Range { min, max, step } => {
                if !min.is_finite() || !max.is_finite() || !step.is_finite() {
                    return Err(ShapeMatchError::InvalidSampling {
                        reason: "non-finite range parameters",
                    });
                }
                if *step <= 0.0 {
                    return Err(ShapeMatchError::InvalidSampling {
                        reason: "step must be > 0",
                    });
                }
                if max < min {
                    return Err(ShapeMatchError::InvalidSampling {
                        reason: "max must not be below min",
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the sampled values.
    pub fn values(&self) -> ShapeMatchResult<Vec<f32>> {
        self.validate()?;
        Ok(match self {
            Sampling::Fixed(value) => vec![*value],
            Sampling::List(values) => values.clone(),
            Sampling::Range { min, max, step } => {
                let mut values = Vec::new();
                let mut idx = 0usize;
                loop {
                    // Multiply instead of accumulating to avoid drift.
                    let value = min + idx as f32 * step;
                    if value > max + ENDPOINT_EPS {
                        break;
                    }
                    values.push(value);
                    idx += 1;
                }
                values
            }
        })
    }

    /// Returns angle samples; a range spanning a full turn drops the end
    /// value that coincides with the start.
    pub fn angle_values(&self) -> ShapeMatchResult<Vec<f32>> {
        let mut values = self.values()?;
        if let Sampling::Range { min, max, .. } = self {
            let full_turn = (max - min - 360.0).abs() <= ENDPOINT_EPS;
            if full_turn && values.len() > 1 {
                if let Some(&last) = values.last() {
                    if (last - min - 360.0).abs() <= ENDPOINT_EPS {
                        values.pop();
                    }
                }
            }
        }
        Ok(values)
    }
}
