use core::fmt;
use std::{
    ops::{Index, IndexMut},
    slice::ChunksExact,
    str::FromStr,
};

use bytemuck::TransparentWrapper;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub const BOARD_SIZE: u8 = 8;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::White => "white",
            Self::Black => "black",
        })
    }
}

impl FromStr for Side {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" | "w" => Ok(Self::White),
            "black" | "b" => Ok(Self::Black),
            _ => Err(ParseError::Side(s.into())),
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Self::White,
            shakmaty::Color::Black => Self::Black,
        }
    }
}

/// Occupancy of one square as far as the sensors (or the replayed game) can tell.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum SquareState {
    White,
    Black,
    #[default]
    Empty,
}

impl SquareState {
    pub const fn occupied_by(side: Side) -> Self {
        match side {
            Side::White => Self::White,
            Side::Black => Self::Black,
        }
    }

    pub const fn side(self) -> Option<Side> {
        match self {
            Self::White => Some(Side::White),
            Self::Black => Some(Side::Black),
            Self::Empty => None,
        }
    }

    pub const fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for SquareState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::White => "W",
            Self::Black => "B",
            Self::Empty => "_",
        })
    }
}

/// A board square, stored as `rank * 8 + file` (a1 = 0, h8 = 63).
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub const COUNT: usize = 64;

    pub const fn new(file: u8, rank: u8) -> Self {
        assert!(file < BOARD_SIZE);
        assert!(rank < BOARD_SIZE);
        Self(rank * BOARD_SIZE + file)
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        if (index as usize) < Self::COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn file(self) -> u8 {
        self.0 % BOARD_SIZE
    }

    pub const fn rank(self) -> u8 {
        self.0 / BOARD_SIZE
    }

    pub fn all() -> impl DoubleEndedIterator<Item = Square> {
        (0..Self::COUNT as u8).map(Self)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file()) as char,
            (b'1' + self.rank()) as char
        )
    }
}

impl FromStr for Square {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            &[file @ b'a'..=b'h', rank @ b'1'..=b'8'] => Ok(Self::new(file - b'a', rank - b'1')),
            _ => Err(ParseError::Square(s.into())),
        }
    }
}

/// A set of squares backed by a single bitboard. Iterates in ascending square order.
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
pub struct SquareSet(u64);

impl SquareSet {
    pub const EMPTY: Self = Self(0);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn insert(&mut self, square: Square) {
        self.0 |= 1 << square.0;
    }

    pub const fn contains(self, square: Square) -> bool {
        self.0 & (1 << square.0) != 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The only member of the set, if it has exactly one.
    pub const fn single(self) -> Option<Square> {
        if self.0.count_ones() == 1 {
            Some(Square(self.0.trailing_zeros() as u8))
        } else {
            None
        }
    }

    pub fn iter(self) -> SquareSetIter {
        SquareSetIter(self.0)
    }
}

impl fmt::Debug for SquareSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|sq| sq.to_string())).finish()
    }
}

impl FromIterator<Square> for SquareSet {
    fn from_iter<T: IntoIterator<Item = Square>>(iter: T) -> Self {
        let mut set = Self::EMPTY;
        for square in iter {
            set.insert(square);
        }
        set
    }
}

impl IntoIterator for SquareSet {
    type Item = Square;
    type IntoIter = SquareSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct SquareSetIter(u64);

impl Iterator for SquareSetIter {
    type Item = Square;

    fn next(&mut self) -> Option<Square> {
        if self.0 == 0 {
            return None;
        }
        let square = Square(self.0.trailing_zeros() as u8);
        self.0 &= self.0 - 1;
        Some(square)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.0.count_ones() as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for SquareSetIter {}

/// An 8x8 occupancy board. Rows are ranks, starting from rank 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    grid: [SquareState; Square::COUNT],
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut line_sep = "";
        for row in self.iter().rev() {
            f.write_str(line_sep)?;
            let mut cell_sep = "";
            for cell in row {
                write!(f, "{cell_sep}{cell}")?;
                cell_sep = "|";
            }
            line_sep = "\n";
        }
        Ok(())
    }
}

impl Grid {
    pub const fn empty() -> Self {
        Self {
            grid: [SquareState::Empty; Square::COUNT],
        }
    }

    /// Occupancy of the standard chess starting position.
    pub fn starting_position() -> Self {
        let mut result = Self::empty();
        for (y, row) in result.iter_mut().enumerate() {
            let state = match y {
                0 | 1 => SquareState::White,
                6 | 7 => SquareState::Black,
                _ => continue,
            };
            row.fill(state);
        }
        result
    }

    pub fn iter(&self) -> GridIter<'_> {
        GridIter::new(self)
    }

    pub fn iter_mut(&mut self) -> core::slice::ChunksExactMut<'_, SquareState> {
        self.grid.chunks_exact_mut(BOARD_SIZE as usize)
    }

    pub fn occupied(&self) -> SquareSet {
        Square::all().filter(|&sq| !self[sq].is_empty()).collect()
    }
}

#[allow(clippy::type_complexity)]
pub struct GridIter<'a>(core::iter::Map<ChunksExact<'a, SquareState>, fn(&[SquareState]) -> &GridRow>);

impl<'a> GridIter<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        Self(
            grid.grid
                .chunks_exact(BOARD_SIZE as usize)
                .map(|x| GridRow::wrap_ref(x)),
        )
    }

    pub fn enumerate_u8(self) -> impl Iterator<Item = (u8, &'a GridRow)> {
        self.0.enumerate().map(|(i, x)| (i as u8, x))
    }
}

impl<'a> Iterator for GridIter<'a> {
    type Item = &'a GridRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl DoubleEndedIterator for GridIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back()
    }
}

impl Index<Square> for Grid {
    type Output = SquareState;

    fn index(&self, square: Square) -> &SquareState {
        &self.grid[square.index()]
    }
}

impl IndexMut<Square> for Grid {
    fn index_mut(&mut self, square: Square) -> &mut SquareState {
        &mut self.grid[square.index()]
    }
}

impl Index<u8> for Grid {
    type Output = GridRow;

    fn index(&self, rank: u8) -> &GridRow {
        let start = rank as usize * BOARD_SIZE as usize;
        GridRow::wrap_ref(&self.grid[start..start + BOARD_SIZE as usize])
    }
}

impl<'a> IntoIterator for &'a Grid {
    type Item = &'a GridRow;
    type IntoIter = GridIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(TransparentWrapper)]
#[repr(transparent)]
pub struct GridRow([SquareState]);

impl GridRow {
    pub fn iter(&self) -> GridRowIter<'_> {
        GridRowIter::new(self)
    }
}

impl Index<u8> for GridRow {
    type Output = SquareState;

    fn index(&self, file: u8) -> &SquareState {
        &self.0[file as usize]
    }
}

impl<'a> IntoIterator for &'a GridRow {
    type Item = &'a SquareState;
    type IntoIter = GridRowIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct GridRowIter<'a>(core::slice::Iter<'a, SquareState>);

impl<'a> GridRowIter<'a> {
    pub fn new(row: &'a GridRow) -> Self {
        Self(row.0.iter())
    }

    pub fn enumerate_u8(self) -> impl Iterator<Item = (u8, &'a SquareState)> {
        self.0.enumerate().map(|(i, x)| (i as u8, x))
    }
}

impl<'a> Iterator for GridRowIter<'a> {
    type Item = &'a SquareState;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}
