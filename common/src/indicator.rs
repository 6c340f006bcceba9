use std::time::Duration;

use tokio::time::Instant;

use crate::grid::SquareSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Debounce {
    SendNow(SquareSet),
    /// Arm a timer and call [`IndicatorDebouncer::fire`] after this long.
    Defer(Duration),
    /// A deferred send is already armed and will pick up the new set.
    Coalesced,
}

/// Rate limits LED updates so sensor jitter doesn't make the board flicker.
#[derive(Debug)]
pub struct IndicatorDebouncer {
    interval: Duration,
    lit: SquareSet,
    last_sent: Option<Instant>,
    queued: bool,
}

impl IndicatorDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            lit: SquareSet::EMPTY,
            last_sent: None,
            queued: false,
        }
    }

    pub fn lit(&self) -> SquareSet {
        self.lit
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn update(&mut self, lit: SquareSet, now: Instant) -> Debounce {
        self.lit = lit;
        let elapsed = self.last_sent.map(|sent| now.saturating_duration_since(sent));
        match elapsed {
            Some(elapsed) if elapsed <= self.interval => {
                if self.queued {
                    Debounce::Coalesced
                } else {
                    self.queued = true;
                    Debounce::Defer(self.interval - elapsed)
                }
            }
            _ => {
                self.last_sent = Some(now);
                self.queued = false;
                Debounce::SendNow(lit)
            }
        }
    }

    /// The deferred timer went off: hand out whatever is lit now.
    pub fn fire(&mut self, now: Instant) -> Option<SquareSet> {
        if !self.queued {
            return None;
        }
        self.queued = false;
        self.last_sent = Some(now);
        Some(self.lit)
    }

    /// Forgets any armed deferred send.
    pub fn cancel(&mut self) {
        self.queued = false;
    }
}
