use anyhow::{ensure, Result};

use super::{Position, Symmetry, MAX_BOARD_SIZE};

/// Converts positions into fixed-width network input rows and maps network policies back to
/// board locations. Rows are always encoded in the canonical orientation; symmetries are applied
/// to already encoded rows so that the evaluator can choose them after a batch has been claimed.
pub trait FeatureEncoder: Send + Sync {
    type Position;

    fn row_width(&self) -> usize;

    fn policy_size(&self) -> usize;

    /// Rejects positions this encoder cannot encode.
    fn validate(&self, _position: &Self::Position) -> Result<()> {
        Ok(())
    }

    /// Writes the feature row and the legality of every policy entry. The position must have
    /// passed `validate`.
    fn encode(&self, position: &Self::Position, row: &mut [f32], legal: &mut [bool]);

    fn transform_row(&self, row: &[f32], symmetry: Symmetry, transformed: &mut [f32]);

    /// Inverse of `transform_row` for policies: maps a policy produced for the transformed
    /// row back to the canonical orientation.
    fn untransform_policy(&self, policy: &[f32], symmetry: Symmetry, untransformed: &mut [f32]);
}

pub const NUM_PLANES: usize = 4;

const ON_BOARD_PLANE: usize = 0;
const OWN_STONES_PLANE: usize = 1;
const OPPONENT_STONES_PLANE: usize = 2;
const KO_PLANE: usize = 3;

/// Encodes a `Position` as `NUM_PLANES` planes of `size * size`, laid out `[plane][y][x]`.
/// The policy holds one entry per point followed by pass.
#[derive(Clone, Debug)]
pub struct PlanarEncoder {
    board_size: usize,
}

impl PlanarEncoder {
    pub fn new(board_size: usize) -> Result<Self> {
        ensure!(
            (1..=MAX_BOARD_SIZE).contains(&board_size),
            "Board size must be between 1 and {}, found {}",
            MAX_BOARD_SIZE,
            board_size
        );

        Ok(Self { board_size })
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    fn area(&self) -> usize {
        self.board_size * self.board_size
    }
}

impl FeatureEncoder for PlanarEncoder {
    type Position = Position;

    fn row_width(&self) -> usize {
        NUM_PLANES * self.area()
    }

    fn policy_size(&self) -> usize {
        self.area() + 1
    }

    fn validate(&self, position: &Position) -> Result<()> {
        ensure!(
            position.size() == self.board_size,
            "Position is {}x{} but the encoder expects {}x{}",
            position.size(),
            position.size(),
            self.board_size,
            self.board_size
        );

        Ok(())
    }

    fn encode(&self, position: &Position, row: &mut [f32], legal: &mut [bool]) {
        assert_eq!(
            position.size(),
            self.board_size,
            "Position size does not match the encoder"
        );

        let area = self.area();
        let to_move = position.next_player();

        row.fill(0.0);

        for loc in 0..area {
            row[ON_BOARD_PLANE * area + loc] = 1.0;

            match position.stone_at(loc) {
                Some(player) if player == to_move => row[OWN_STONES_PLANE * area + loc] = 1.0,
                Some(_) => row[OPPONENT_STONES_PLANE * area + loc] = 1.0,
                None => {}
            }
        }

        if let Some(ko) = position.ko() {
            row[KO_PLANE * area + ko] = 1.0;
        }

        for (loc, is_legal) in legal.iter_mut().enumerate() {
            *is_legal = position.is_legal(loc);
        }
    }

    fn transform_row(&self, row: &[f32], symmetry: Symmetry, transformed: &mut [f32]) {
        let size = self.board_size;
        let area = self.area();

        for (plane, transformed_plane) in row
            .chunks_exact(area)
            .zip(transformed.chunks_exact_mut(area))
        {
            for y in 0..size {
                for x in 0..size {
                    let (tx, ty) = symmetry.apply(x, y, size);
                    transformed_plane[ty * size + tx] = plane[y * size + x];
                }
            }
        }
    }

    fn untransform_policy(&self, policy: &[f32], symmetry: Symmetry, untransformed: &mut [f32]) {
        let size = self.board_size;
        let area = self.area();

        for y in 0..size {
            for x in 0..size {
                let (tx, ty) = symmetry.apply(x, y, size);
                untransformed[y * size + x] = policy[ty * size + tx];
            }
        }

        untransformed[area] = policy[area];
    }
}
