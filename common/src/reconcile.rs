use crate::grid::{Grid, Square, SquareSet};

/// Where the physical board disagrees with the replayed game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mismatch {
    /// Every disagreeing square, for the indicator.
    pub lit: SquareSet,
    /// A piece was expected but the square is empty.
    pub sources: SquareSet,
    /// Anything else: an unexpected piece, or the wrong colour.
    pub destinations: SquareSet,
}

impl Mismatch {
    pub const fn is_in_sync(&self) -> bool {
        self.sources.is_empty() && self.destinations.is_empty()
    }
}

/// Compares all 64 squares. Without an active session nothing is reported.
pub fn reconcile(physical: &Grid, logical: &Grid, session_active: bool) -> Mismatch {
    let mut result = Mismatch::default();
    if !session_active {
        return result;
    }

    for ((rank, physical_row), logical_row) in physical.iter().enumerate_u8().zip(logical) {
        for ((file, &actual), &expected) in physical_row.iter().enumerate_u8().zip(logical_row) {
            if actual == expected {
                continue;
            }
            let square = Square::new(file, rank);
            result.lit.insert(square);
            if !expected.is_empty() && actual.is_empty() {
                result.sources.insert(square);
            } else {
                result.destinations.insert(square);
            }
        }
    }
    result
}
