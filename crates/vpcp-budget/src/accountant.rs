//! The Budget/Capacity Accountant (C7): single source of truth for
//! per-day, per-provider credit envelopes and per-tier production counts
//! (spec.md §4.7).
//!
//! Reservation is the one hot path that requires a cross-handler critical
//! section (spec.md §5 "Shared-resource policy"); it is kept short by
//! locking a single provider's ledger, never a global lock.

use crate::ledger::{LedgerError, ProviderLedger};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use time::Date;
use vpcp_types::{ProviderId, QualityTier, ReservationId};

#[cfg(feature = "metrics")]
use metrics::gauge;

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum BudgetError {
    #[error("no provider {0} registered with the accountant")]
    UnknownProvider(ProviderId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("reservation {0} not found (already committed/released, or never issued)")]
    UnknownReservation(ReservationId),
}

#[derive(Debug, Default)]
pub(crate) struct TierCounters {
    pub target: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
}

struct PendingReservation {
    provider_id: ProviderId,
    credits: u64,
}

/// Per-provider, per-day credit ledger plus per-tier production counts.
///
/// Shared across every handler and the Poller within a process; `dashmap`
/// shards the per-provider locks so reservations against different
/// providers never contend (matches the pack's convention for this shape
/// of shared state, e.g. `tower-resilience-circuitbreaker`'s per-pattern
/// state).
pub struct BudgetAccountant {
    ledgers: DashMap<ProviderId, Mutex<ProviderLedger>>,
    reservations: DashMap<ReservationId, PendingReservation>,
    tiers: DashMap<QualityTier, TierCounters>,
    current_day: Mutex<Date>,
}

/// A read-only snapshot of one provider's ledger, passed to the Router so
/// that `select` stays a pure function over explicit state (spec.md §8.4
/// "Router purity").
#[derive(Debug, Clone, Copy)]
pub struct ProviderBudgetSnapshot {
    pub credits_remaining: u64,
    pub credits_reserved: u64,
    pub credits_committed: u64,
    pub daily_limit: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TierCountSnapshot {
    pub target: u64,
    pub completed: u64,
    pub failed: u64,
}

impl BudgetAccountant {
    pub fn new(today: Date) -> Self {
        Self {
            ledgers: DashMap::new(),
            reservations: DashMap::new(),
            tiers: DashMap::new(),
            current_day: Mutex::new(today),
        }
    }

    pub fn register_provider(&self, provider_id: impl Into<ProviderId>, daily_limit: u64) {
        self.ledgers
            .insert(provider_id.into(), Mutex::new(ProviderLedger::new(daily_limit)));
    }

    pub fn set_tier_target(&self, tier: QualityTier, target: u64) {
        self.tiers.entry(tier).or_default().target.store(target, Ordering::Relaxed);
    }

    /// `reserve(provider_id, credits) -> reservation_id | BudgetExhausted`
    /// (spec.md §4.7). Atomic per-provider: the lock is held only for the
    /// arithmetic, never across I/O.
    pub fn reserve(&self, provider_id: &str, credits: u64) -> Result<ReservationId, BudgetError> {
        let ledger = self
            .ledgers
            .get(provider_id)
            .ok_or_else(|| BudgetError::UnknownProvider(provider_id.to_string()))?;
        ledger.lock().reserve(credits)?;

        #[cfg(feature = "metrics")]
        self.emit_gauges(provider_id, &ledger);

        let reservation_id = ReservationId::new();
        self.reservations.insert(
            reservation_id,
            PendingReservation {
                provider_id: provider_id.to_string(),
                credits,
            },
        );
        Ok(reservation_id)
    }

    /// `commit(reservation_id)`, called on terminal success (spec.md §4.7).
    pub fn commit(&self, reservation_id: ReservationId) -> Result<(), BudgetError> {
        let (_, pending) = self
            .reservations
            .remove(&reservation_id)
            .ok_or(BudgetError::UnknownReservation(reservation_id))?;
        let ledger = self
            .ledgers
            .get(&pending.provider_id)
            .ok_or_else(|| BudgetError::UnknownProvider(pending.provider_id.clone()))?;
        ledger.lock().commit(pending.credits);

        #[cfg(feature = "metrics")]
        self.emit_gauges(&pending.provider_id, &ledger);

        Ok(())
    }

    /// `release(reservation_id)`, called on terminal failure (spec.md §4.7).
    pub fn release(&self, reservation_id: ReservationId) -> Result<(), BudgetError> {
        let (_, pending) = self
            .reservations
            .remove(&reservation_id)
            .ok_or(BudgetError::UnknownReservation(reservation_id))?;
        let ledger = self
            .ledgers
            .get(&pending.provider_id)
            .ok_or_else(|| BudgetError::UnknownProvider(pending.provider_id.clone()))?;
        ledger.lock().release(pending.credits);

        #[cfg(feature = "metrics")]
        self.emit_gauges(&pending.provider_id, &ledger);

        Ok(())
    }

    pub fn snapshot(&self, provider_id: &str) -> Option<ProviderBudgetSnapshot> {
        self.ledgers.get(provider_id).map(|ledger| {
            let ledger = ledger.lock();
            ProviderBudgetSnapshot {
                credits_remaining: ledger.remaining,
                credits_reserved: ledger.reserved,
                credits_committed: ledger.committed,
                daily_limit: ledger.daily_limit,
            }
        })
    }

    pub fn record_tier_completed(&self, tier: QualityTier) {
        self.tiers.entry(tier).or_default().completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier_failed(&self, tier: QualityTier) {
        self.tiers.entry(tier).or_default().failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tier_counts(&self, tier: QualityTier) -> TierCountSnapshot {
        let entry = self.tiers.entry(tier).or_default();
        TierCountSnapshot {
            target: entry.target.load(Ordering::Relaxed),
            completed: entry.completed.load(Ordering::Relaxed),
            failed: entry.failed.load(Ordering::Relaxed),
        }
    }

    /// Checks every registered provider's conservation invariant (spec.md
    /// §8.2), used by property tests and the `/health` endpoint.
    pub fn check_all_invariants(&self) -> Result<(), BudgetError> {
        for entry in self.ledgers.iter() {
            entry.value().lock().check_invariant()?;
        }
        Ok(())
    }

    /// 00:00 UTC rollover (spec.md §4.7 "Reset"). Idempotent if called
    /// again for the same `today`.
    pub fn roll_over_if_new_day(&self, today: Date, new_daily_limits: &DashMap<ProviderId, u64>) {
        let mut current = self.current_day.lock();
        if *current == today {
            return;
        }
        *current = today;
        for mut entry in self.ledgers.iter_mut() {
            let new_limit = new_daily_limits
                .get(entry.key())
                .map(|v| *v)
                .unwrap_or_else(|| entry.lock().daily_limit);
            entry.lock().roll_over(new_limit);
        }
        for entry in self.tiers.iter() {
            entry.completed.store(0, Ordering::Relaxed);
            entry.failed.store(0, Ordering::Relaxed);
        }
    }

    pub fn current_day(&self) -> Date {
        *self.current_day.lock()
    }

    #[cfg(feature = "metrics")]
    fn emit_gauges(&self, provider_id: &str, ledger: &Mutex<ProviderLedger>) {
        let ledger = ledger.lock();
        gauge!("vpcp_budget_credits_remaining", "provider" => provider_id.to_string())
            .set(ledger.remaining as f64);
        gauge!("vpcp_budget_credits_reserved", "provider" => provider_id.to_string())
            .set(ledger.reserved as f64);
        gauge!("vpcp_budget_credits_committed", "provider" => provider_id.to_string())
            .set(ledger.committed as f64);
    }
}
