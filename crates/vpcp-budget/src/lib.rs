//! The Budget/Capacity Accountant (C7 of the video production control
//! plane): single source of truth for per-day, per-provider credit
//! envelopes and per-tier production counts (spec.md §4.7).
//!
//! Budget never calls the Router or the Poller (spec.md §9 "Cycles
//! between Poller <-> Router <-> Budget"): it is a passive ledger that
//! other components call into and snapshot from.

mod accountant;
mod ledger;

pub use accountant::{BudgetAccountant, BudgetError, ProviderBudgetSnapshot, TierCountSnapshot};
pub use ledger::LedgerError;
