use std::fmt;

use anyhow::{ensure, Error, Result};
use serde::{Deserialize, Serialize};

pub const NUM_SYMMETRIES: usize = 8;

const FLIP_Y: u8 = 0b001;
const FLIP_X: u8 = 0b010;
const TRANSPOSE: u8 = 0b100;

/// One of the eight dihedral transforms of a square board.
/// Applied as: mirror x, mirror y, then transpose, each only if its bit is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symmetry(u8);

impl Symmetry {
    pub const IDENTITY: Symmetry = Symmetry(0);

    pub fn all() -> impl Iterator<Item = Symmetry> {
        (0..NUM_SYMMETRIES as u8).map(Symmetry)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_transpose(self) -> bool {
        self.0 & TRANSPOSE != 0
    }

    pub fn is_flip_x(self) -> bool {
        self.0 & FLIP_X != 0
    }

    pub fn is_flip_y(self) -> bool {
        self.0 & FLIP_Y != 0
    }

    /// Maps the point (x, y) on a board of width `size` to its transformed coordinates.
    #[inline]
    pub fn apply(self, x: usize, y: usize, size: usize) -> (usize, usize) {
        let x = if self.is_flip_x() { size - 1 - x } else { x };
        let y = if self.is_flip_y() { size - 1 - y } else { y };

        if self.is_transpose() {
            (y, x)
        } else {
            (x, y)
        }
    }

    pub fn inverse(self) -> Self {
        if self.is_transpose() {
            let mut bits = TRANSPOSE;
            if self.is_flip_x() {
                bits |= FLIP_Y;
            }
            if self.is_flip_y() {
                bits |= FLIP_X;
            }
            Symmetry(bits)
        } else {
            self
        }
    }
}

impl TryFrom<usize> for Symmetry {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self> {
        ensure!(
            index < NUM_SYMMETRIES,
            "Symmetry must be less than {}, found {}",
            NUM_SYMMETRIES,
            index
        );

        Ok(Symmetry(index as u8))
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
