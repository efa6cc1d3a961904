//! Conversions from game outcomes to the scalar utility scale the network predicts on.

use engine::Player;

pub const MAX_UTILITY: f64 = 1.0;
pub const MIN_UTILITY: f64 = -1.0;
pub const DRAW_UTILITY: f64 = (MAX_UTILITY + MIN_UTILITY) / 2.0;

/// Margin, in units of the board's side length, at which the score utility reaches tanh(1).
pub const SCORE_SCALE: f64 = 0.5;

/// The utility for `perspective` of a game won by `winner`. `None` is a draw or no result.
pub fn utility_of_winner(winner: Option<Player>, perspective: Player) -> f64 {
    match winner {
        Some(player) if player == perspective => MAX_UTILITY,
        Some(_) => MIN_UTILITY,
        None => DRAW_UTILITY,
    }
}

/// The utility of finishing `margin` points ahead on a board of `board_size` x `board_size`.
/// Increasing and odd in `margin`, bounded by the utility range, and flatter on larger boards.
pub fn utility_of_score(margin: f64, board_size: usize) -> f64 {
    let area = (board_size * board_size).max(1) as f64;

    (margin / (SCORE_SCALE * area.sqrt())).tanh() * MAX_UTILITY
}
