//! Per-provider credit ledger: the invariant `credits_remaining +
//! credits_reserved + credits_committed == credits_daily_limit` (spec.md
//! §3 "Budget", §8.2) holds after every operation on a single provider's
//! ledger because `reserve`/`commit`/`release` only ever move credits
//! between the three buckets, never create or destroy them.

use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProviderLedger {
    pub daily_limit: u64,
    pub remaining: u64,
    pub reserved: u64,
    pub committed: u64,
    /// Credits still reserved from a prior day's ledger, carried over at
    /// rollover rather than re-inflating the new day's limit (spec.md
    /// §4.7 "Reset").
    pub overflow: u64,
    pub last_probe_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum LedgerError {
    #[error("budget exhausted: requested {requested} credits, {available} remaining")]
    Exhausted { requested: u64, available: u64 },
    #[error("invariant violated: remaining + reserved + committed != daily_limit + overflow")]
    InvariantViolated,
}

impl ProviderLedger {
    pub(crate) fn new(daily_limit: u64) -> Self {
        Self {
            daily_limit,
            remaining: daily_limit,
            reserved: 0,
            committed: 0,
            overflow: 0,
            last_probe_at: None,
        }
    }

    /// `daily_limit + overflow` is the quantity conserved across
    /// `remaining + reserved + committed` (spec.md §8.2 generalized to
    /// account for the overflow bucket introduced at rollover).
    fn total(&self) -> u64 {
        self.daily_limit + self.overflow
    }

    pub(crate) fn check_invariant(&self) -> Result<(), LedgerError> {
        if self.remaining + self.reserved + self.committed == self.total() {
            Ok(())
        } else {
            Err(LedgerError::InvariantViolated)
        }
    }

    pub(crate) fn reserve(&mut self, credits: u64) -> Result<(), LedgerError> {
        if self.remaining < credits {
            return Err(LedgerError::Exhausted {
                requested: credits,
                available: self.remaining,
            });
        }
        self.remaining -= credits;
        self.reserved += credits;
        Ok(())
    }

    pub(crate) fn commit(&mut self, credits: u64) {
        debug_assert!(self.reserved >= credits);
        self.reserved = self.reserved.saturating_sub(credits);
        self.committed += credits;
    }

    pub(crate) fn release(&mut self, credits: u64) {
        debug_assert!(self.reserved >= credits);
        self.reserved = self.reserved.saturating_sub(credits);
        self.remaining += credits;
    }

    /// 00:00 UTC rollover (spec.md §4.7 "Reset"): the new day's `remaining`
    /// is reset to `new_daily_limit`; any still-reserved credits from the
    /// previous day carry over into `overflow` rather than inflating the
    /// new day's limit, and committed/reserved from the prior day are
    /// dropped since they belong to the prior day's bookkeeping only.
    pub(crate) fn roll_over(&mut self, new_daily_limit: u64) {
        let carried_reservations = self.reserved;
        self.daily_limit = new_daily_limit;
        self.remaining = new_daily_limit;
        self.reserved = carried_reservations;
        self.committed = 0;
        self.overflow = carried_reservations;
    }
}
