use anyhow::{ensure, Result};

use super::Player;

pub const MAX_BOARD_SIZE: usize = 19;

/// A square board with stones, the player to move and an optional ko point.
/// Locations index points as `y * size + x`; the location `size * size` is a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    size: usize,
    stones: Vec<Option<Player>>,
    next_player: Player,
    ko: Option<usize>,
}

impl Position {
    pub fn new(size: usize) -> Result<Self> {
        ensure!(
            (1..=MAX_BOARD_SIZE).contains(&size),
            "Board size must be between 1 and {}, found {}",
            MAX_BOARD_SIZE,
            size
        );

        Ok(Self {
            size,
            stones: vec![None; size * size],
            next_player: Player::Black,
            ko: None,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn next_player(&self) -> Player {
        self.next_player
    }

    pub fn ko(&self) -> Option<usize> {
        self.ko
    }

    pub fn num_locations(&self) -> usize {
        self.size * self.size + 1
    }

    pub fn pass_loc(&self) -> usize {
        self.size * self.size
    }

    pub fn loc(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }

    pub fn stone_at(&self, loc: usize) -> Option<Player> {
        self.stones.get(loc).copied().flatten()
    }

    /// Places a stone without changing the player to move.
    pub fn set_stone(&mut self, loc: usize, player: Option<Player>) -> Result<()> {
        ensure!(loc < self.stones.len(), "Location {} is off the board", loc);
        self.stones[loc] = player;
        Ok(())
    }

    /// Marks a point that the player to move may not play because of the repetition rule.
    pub fn set_ko(&mut self, ko: Option<usize>) -> Result<()> {
        if let Some(loc) = ko {
            ensure!(loc < self.stones.len(), "Ko location {} is off the board", loc);
        }
        self.ko = ko;
        Ok(())
    }

    pub fn is_legal(&self, loc: usize) -> bool {
        if loc == self.pass_loc() {
            return true;
        }

        loc < self.stones.len() && self.stones[loc].is_none() && self.ko != Some(loc)
    }

    pub fn play(&mut self, loc: usize) -> Result<()> {
        ensure!(self.is_legal(loc), "Move {} is not legal", loc);

        if loc != self.pass_loc() {
            self.stones[loc] = Some(self.next_player);
        }

        self.ko = None;
        self.next_player = self.next_player.opponent();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_position_is_empty() {
        let position = Position::new(9).unwrap();

        assert_eq!(position.num_locations(), 82);
        assert_eq!(position.next_player(), Player::Black);
        assert!((0..81).all(|loc| position.stone_at(loc).is_none()));
    }

    #[test]
    fn test_invalid_size() {
        assert!(Position::new(0).is_err());
        assert!(Position::new(MAX_BOARD_SIZE + 1).is_err());
    }

    #[test]
    fn test_play_alternates_players() {
        let mut position = Position::new(5).unwrap();
        let loc = position.loc(2, 3);

        position.play(loc).unwrap();

        assert_eq!(position.stone_at(loc), Some(Player::Black));
        assert_eq!(position.next_player(), Player::White);
        assert!(!position.is_legal(loc));
        assert!(position.play(loc).is_err());
    }

    #[test]
    fn test_ko_point_is_illegal_until_next_move() {
        let mut position = Position::new(5).unwrap();
        position.set_ko(Some(7)).unwrap();

        assert!(!position.is_legal(7));

        position.play(position.pass_loc()).unwrap();

        assert!(position.is_legal(7));
    }

    #[test]
    fn test_pass_is_always_legal() {
        let mut position = Position::new(1).unwrap();
        position.play(0).unwrap();

        assert!(!position.is_legal(0));
        assert!(position.is_legal(position.pass_loc()));
    }
}
