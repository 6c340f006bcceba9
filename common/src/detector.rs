use tracing::debug;

use crate::{grid::Side, reconcile::Mismatch, rules::Replay};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum IdleReason {
    NotOurTurn,
    InSync,
    Illegal,
    AlreadyCommitted,
}

/// What the physical board says about the local player's move.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Detection {
    Idle(IdleReason),
    /// The board differs in a way that can't be pinned to one move yet.
    Ambiguous,
    /// A single legal move in UCI notation.
    Candidate(String),
}

impl Detection {
    pub fn candidate(&self) -> Option<&str> {
        match self {
            Self::Candidate(mv) => Some(mv),
            _ => None,
        }
    }
}

/// Decides whether a mismatch is exactly one move by `side`.
///
/// Checks run in a fixed order: turn, sync, uniqueness, legality, duplicate. Pawns
/// reaching the last rank are assumed to promote to a queen since the sensors can't
/// tell pieces apart.
pub fn detect(
    mismatch: &Mismatch,
    replay: &Replay,
    side: Side,
    last_committed: Option<&str>,
) -> Detection {
    if replay.turn() != side {
        debug!("waiting for opponent to play");
        return Detection::Idle(IdleReason::NotOurTurn);
    }

    if mismatch.is_in_sync() {
        debug!("position matches remote state");
        return Detection::Idle(IdleReason::InSync);
    }

    let (Some(source), Some(destination)) =
        (mismatch.sources.single(), mismatch.destinations.single())
    else {
        debug!(
            sources = ?mismatch.sources,
            destinations = ?mismatch.destinations,
            "board differs in more than one move"
        );
        return Detection::Ambiguous;
    };

    let bare = format!("{source}{destination}");
    let candidate = if replay.is_legal(&bare) {
        bare
    } else {
        let promotion = format!("{bare}q");
        if !replay.is_legal(&promotion) {
            debug!(candidate = %bare, "invalid move");
            return Detection::Idle(IdleReason::Illegal);
        }
        promotion
    };

    if last_committed == Some(candidate.as_str()) {
        debug!(candidate = %candidate, "already played this move");
        return Detection::Idle(IdleReason::AlreadyCommitted);
    }

    Detection::Candidate(candidate)
}
