use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateMove {
    pub mv: String,
    pub due: Instant,
    pub ticket: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    /// A new settle window started; arm a timer for `due` carrying `ticket`.
    Scheduled { ticket: u64, due: Instant },
    /// The same move is already waiting out its window.
    Unchanged,
}

/// Holds a detected move back for a settle window so a piece can be slid across
/// several squares before anything is sent.
#[derive(Debug)]
pub struct CommitScheduler {
    settle: Duration,
    pending: Option<CandidateMove>,
    next_ticket: u64,
}

impl CommitScheduler {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            pending: None,
            next_ticket: 0,
        }
    }

    pub fn pending(&self) -> Option<&CandidateMove> {
        self.pending.as_ref()
    }

    /// Re-offering the pending move keeps its original deadline.
    pub fn offer(&mut self, mv: &str, now: Instant) -> Offer {
        if self.pending.as_ref().is_some_and(|pending| pending.mv == mv) {
            return Offer::Unchanged;
        }
        self.next_ticket += 1;
        let due = now + self.settle;
        if let Some(replaced) = &self.pending {
            debug!(replaced = %replaced.mv, mv, "candidate move replaced");
        }
        self.pending = Some(CandidateMove {
            mv: mv.into(),
            due,
            ticket: self.next_ticket,
        });
        Offer::Scheduled {
            ticket: self.next_ticket,
            due,
        }
    }

    pub fn cancel(&mut self) -> Option<CandidateMove> {
        self.pending.take()
    }

    /// Called when the timer for `ticket` fires. Yields the move to submit only if that
    /// ticket is still the pending one and its window has elapsed.
    pub fn take_due(&mut self, ticket: u64, now: Instant) -> Option<String> {
        match &self.pending {
            Some(pending) if pending.ticket == ticket && pending.due <= now => {
                self.pending.take().map(|pending| pending.mv)
            }
            _ => None,
        }
    }
}
