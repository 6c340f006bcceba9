//! Chess rules, delegated to `shakmaty`.
//!
//! The remote service reports its move history as UCI strings. Replaying that history is
//! the only way a logical board is ever produced, so there is no long-lived position to
//! keep in sync.

use shakmaty::{Chess, Color, Position, uci::UciMove};

use crate::{
    error::RulesError,
    grid::{Grid, Side, Square, SquareState},
};

/// The position reached after replaying a move list from the initial position.
#[derive(Clone, Debug)]
pub struct Replay {
    position: Chess,
    grid: Grid,
}

impl Default for Replay {
    fn default() -> Self {
        Self::from_position(Chess::default())
    }
}

impl Replay {
    pub fn from_moves<S: AsRef<str>>(moves: &[S]) -> Result<Self, RulesError> {
        let mut position = Chess::default();
        for (index, mv) in moves.iter().enumerate() {
            let mv = mv.as_ref();
            let uci: UciMove = mv.parse().map_err(|_| RulesError::Malformed {
                index,
                mv: mv.into(),
            })?;
            let illegal = || RulesError::Illegal {
                index,
                mv: mv.into(),
            };
            let legal = uci.to_move(&position).map_err(|_| illegal())?;
            position = position.play(&legal).map_err(|_| illegal())?;
        }
        Ok(Self::from_position(position))
    }

    fn from_position(position: Chess) -> Self {
        let mut grid = Grid::empty();
        let board = position.board();
        for color in [Color::White, Color::Black] {
            let state = SquareState::occupied_by(color.into());
            for square in board.by_color(color) {
                // shakmaty numbers squares a1 = 0 .. h8 = 63, same as ours
                if let Some(square) = Square::from_index(usize::from(square) as u8) {
                    grid[square] = state;
                }
            }
        }
        Self { position, grid }
    }

    /// Square occupancy of the replayed position.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn turn(&self) -> Side {
        self.position.turn().into()
    }

    /// Whether `mv` (UCI) could be played from here. The replay itself is never modified.
    pub fn is_legal(&self, mv: &str) -> bool {
        mv.parse::<UciMove>()
            .is_ok_and(|uci| uci.to_move(&self.position).is_ok())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_history_is_the_starting_position() {
        let replay = Replay::from_moves::<&str>(&[]).unwrap();
        assert_eq!(replay.grid(), &Grid::starting_position());
        assert_eq!(replay.turn(), Side::White);
    }

    #[test]
    fn replays_moves_and_tracks_turn() {
        let replay = Replay::from_moves(&["e2e4", "e7e5", "g1f3"]).unwrap();
        assert_eq!(replay.turn(), Side::Black);
        let grid = replay.grid();
        assert_eq!(grid["e2".parse::<Square>().unwrap()], SquareState::Empty);
        assert_eq!(grid["e4".parse::<Square>().unwrap()], SquareState::White);
        assert_eq!(grid["e5".parse::<Square>().unwrap()], SquareState::Black);
        assert_eq!(grid["f3".parse::<Square>().unwrap()], SquareState::White);
        assert_eq!(grid["g1".parse::<Square>().unwrap()], SquareState::Empty);
    }

    #[test]
    fn captures_change_occupancy() {
        let replay = Replay::from_moves(&["e2e4", "d7d5", "e4d5"]).unwrap();
        assert_eq!(replay.grid().occupied().len(), 31);
        assert_eq!(replay.grid()["d5".parse::<Square>().unwrap()], SquareState::White);
    }

    #[test]
    fn castling_in_king_notation() {
        let replay =
            Replay::from_moves(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6", "e1g1"]).unwrap();
        let grid = replay.grid();
        assert_eq!(grid["g1".parse::<Square>().unwrap()], SquareState::White);
        assert_eq!(grid["f1".parse::<Square>().unwrap()], SquareState::White);
        assert_eq!(grid["e1".parse::<Square>().unwrap()], SquareState::Empty);
        assert_eq!(grid["h1".parse::<Square>().unwrap()], SquareState::Empty);
    }

    #[test]
    fn rejects_bad_histories() {
        assert!(matches!(
            Replay::from_moves(&["e2e4", "nonsense"]),
            Err(RulesError::Malformed { index: 1, .. })
        ));
        assert!(matches!(
            Replay::from_moves(&["e2e5"]),
            Err(RulesError::Illegal { index: 0, .. })
        ));
    }

    #[test]
    fn legality_checks_do_not_mutate() {
        let replay = Replay::default();
        assert!(replay.is_legal("e2e4"));
        assert!(replay.is_legal("g1f3"));
        assert!(!replay.is_legal("e2e5"));
        assert!(!replay.is_legal("e7e5"));
        assert!(!replay.is_legal("zz"));
        assert_eq!(replay.grid(), &Grid::starting_position());
        assert_eq!(replay.turn(), Side::White);
    }
}
