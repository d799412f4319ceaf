use std::fmt;

/// Where a single checkout currently stands.
///
/// ```text
/// Started -> Reading -> Validating -> Aborted
///                                  -> Writing -> Committed
///                                             -> ConflictRetry -> Reading
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    Started,
    Reading,
    Validating,
    Writing,
    ConflictRetry,
    Committed,
    Aborted,
}

impl CheckoutPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckoutPhase::Committed | CheckoutPhase::Aborted)
    }

    pub fn can_transition_to(self, next: CheckoutPhase) -> bool {
        use CheckoutPhase::*;
        matches!(
            (self, next),
            (Started, Reading)
                | (Reading, Validating)
                | (Reading, Aborted)
                | (Validating, Writing)
                | (Validating, Aborted)
                | (Writing, Committed)
                | (Writing, ConflictRetry)
                | (Writing, Aborted)
                | (ConflictRetry, Reading)
                | (ConflictRetry, Aborted)
        )
    }
}

impl fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutPhase::Started => "started",
            CheckoutPhase::Reading => "reading",
            CheckoutPhase::Validating => "validating",
            CheckoutPhase::Writing => "writing",
            CheckoutPhase::ConflictRetry => "conflict_retry",
            CheckoutPhase::Committed => "committed",
            CheckoutPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Phase bookkeeping for one `checkout` call.
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    phase: CheckoutPhase,
    attempt: u32,
}

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        Self {
            phase: CheckoutPhase::Started,
            attempt: 0,
        }
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn enter(&mut self, next: CheckoutPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal checkout transition {} -> {}",
            self.phase,
            next
        );
        if next == CheckoutPhase::Reading {
            self.attempt += 1;
        }
        tracing::debug!(attempt = self.attempt, from = %self.phase, to = %next, "checkout phase");
        self.phase = next;
    }
}
