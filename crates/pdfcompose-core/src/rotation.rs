//! Page rotation normalisation

use crate::error::{ComposeError, Result};
use serde::{Deserialize, Serialize};

/// Canonical page rotation, clockwise as stored in `/Rotate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Normalise any multiple of 90 into a canonical rotation.
    pub fn from_degrees(degrees: i64) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(ComposeError::UnsupportedRotation(degrees));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::R0,
            90 => Rotation::R90,
            180 => Rotation::R180,
            _ => Rotation::R270,
        })
    }

    pub fn degrees(self) -> i64 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    pub fn rotate_by(self, delta: i64) -> Result<Self> {
        accumulate(self.degrees(), delta)
    }

    /// Whether width and height swap on screen.
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }
}

/// Add `delta` to `current`, reducing the result to {0, 90, 180, 270}.
pub fn accumulate(current: i64, delta: i64) -> Result<Rotation> {
    if current % 90 != 0 {
        return Err(ComposeError::UnsupportedRotation(current));
    }
    if delta % 90 != 0 {
        return Err(ComposeError::UnsupportedRotation(delta));
    }
    // Reduce each term first so extreme inputs cannot overflow
    Rotation::from_degrees(current % 360 + delta % 360)
}
