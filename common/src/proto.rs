//! Wire formats spoken with the sensor board.
//!
//! Board → host: a 16 byte [`Frame`] followed by three `0xFF` bytes. Each rank is a
//! pair of bitmaps (white, then black) with bit `j` standing for file `j`.
//!
//! Host → board: an [`IndicatorCommand`], `254`, one byte per lit square, `255`.

use crate::grid::{BOARD_SIZE, Grid, Square, SquareSet, SquareState};

pub const FRAME_LEN: usize = 16;
pub const TERMINATOR: [u8; 3] = [0xFF; 3];
/// Smallest buffer that can hold a complete message.
pub const MESSAGE_LEN: usize = FRAME_LEN + TERMINATOR.len();

pub const COMMAND_START: u8 = 254;
pub const COMMAND_END: u8 = 255;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    pub const fn new(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Decodes the sensor bitmaps. A square with both bits set reads as white.
    pub fn decode(&self) -> Grid {
        let mut grid = Grid::empty();
        for (rank, pair) in self.0.chunks_exact(2).enumerate() {
            let (white, black) = (pair[0], pair[1]);
            for file in 0..BOARD_SIZE {
                let mask = 1 << file;
                grid[Square::new(file, rank as u8)] = if white & mask != 0 {
                    SquareState::White
                } else if black & mask != 0 {
                    SquareState::Black
                } else {
                    SquareState::Empty
                };
            }
        }
        grid
    }

    /// Inverse of [`Frame::decode`], as the board firmware would produce it.
    pub fn encode(grid: &Grid) -> Self {
        let mut bytes = [0; FRAME_LEN];
        for (rank, row) in grid.iter().enumerate() {
            for (file, cell) in row.iter().enumerate_u8() {
                match cell {
                    SquareState::White => bytes[rank * 2] |= 1 << file,
                    SquareState::Black => bytes[rank * 2 + 1] |= 1 << file,
                    SquareState::Empty => {}
                }
            }
        }
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = core::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(value.try_into()?))
    }
}

/// LED command for the board. Squares are sent in ascending order.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct IndicatorCommand(Vec<u8>);

impl IndicatorCommand {
    pub fn new(lit: SquareSet) -> Self {
        let mut bytes = Vec::with_capacity(lit.len() + 2);
        bytes.push(COMMAND_START);
        bytes.extend(lit.iter().map(Self::square_code));
        bytes.push(COMMAND_END);
        Self(bytes)
    }

    pub const fn square_code(square: Square) -> u8 {
        (square.file() << 4) | square.rank()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Reads the lit squares back out of a command.
    pub fn lit_squares(&self) -> SquareSet {
        self.0[1..self.0.len() - 1]
            .iter()
            .map(|&code| Square::new(code >> 4, code & 0x0F))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const STARTING_FRAME: [u8; FRAME_LEN] = [
        0xFF, 0x00, 0xFF, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0xFF, 0x00, 0xFF,
    ];

    #[test]
    fn decodes_starting_position() {
        let grid = Frame::new(STARTING_FRAME).decode();
        assert_eq!(grid, Grid::starting_position());
        assert_eq!(Frame::encode(&grid), Frame::new(STARTING_FRAME));
    }

    #[test]
    fn decode_is_deterministic() {
        let bytes = [0x5A, 0xA5, 0x01, 0x80, 0, 0xFF, 3, 3, 0, 0, 0x10, 0, 0, 0x08, 0x42, 0x24];
        assert_eq!(Frame::new(bytes).decode(), Frame::new(bytes).decode());
    }

    #[test]
    fn bit_positions_map_to_files_and_ranks() {
        let mut bytes = [0; FRAME_LEN];
        bytes[2] = 1 << 4; // white on e2
        bytes[7] = 1 << 0; // black on a4
        let grid = Frame::new(bytes).decode();
        assert_eq!(grid["e2".parse::<Square>().unwrap()], SquareState::White);
        assert_eq!(grid["a4".parse::<Square>().unwrap()], SquareState::Black);
        assert_eq!(grid.occupied().len(), 2);
    }

    #[test]
    fn white_wins_when_both_bits_are_set() {
        let mut bytes = [0; FRAME_LEN];
        bytes[0] = 0b0000_0001;
        bytes[1] = 0b0000_0011;
        let grid = Frame::new(bytes).decode();
        assert_eq!(grid[Square::new(0, 0)], SquareState::White);
        assert_eq!(grid[Square::new(1, 0)], SquareState::Black);
    }

    #[test]
    fn frame_from_slice_requires_exact_length() {
        assert!(Frame::try_from(&STARTING_FRAME[..]).is_ok());
        assert!(Frame::try_from(&STARTING_FRAME[..15]).is_err());
    }

    #[test]
    fn indicator_command_layout() {
        let lit: SquareSet = ["e2", "e4"].iter().map(|s| s.parse().unwrap()).collect();
        let command = IndicatorCommand::new(lit);
        assert_eq!(command.as_bytes(), &[254, 0x41, 0x43, 255]);
        assert_eq!(command.lit_squares(), lit);

        assert_eq!(IndicatorCommand::new(SquareSet::EMPTY).as_bytes(), &[254, 255]);
    }
}
