//! The retry policy: backoff interval selection plus which errors qualify
//! for a retry at all.

use crate::backoff::IntervalFunction;
use std::sync::Arc;
use std::time::Duration;

/// A predicate deciding whether a given error should be retried.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Couples a backoff strategy with an (optional) retry predicate.
///
/// With no predicate configured every error is retried; this mirrors
/// `RetryConfigBuilder`'s default of retrying unconditionally until
/// `max_attempts` is reached.
pub struct RetryPolicy<E> {
    interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    pub fn new(interval_fn: Arc<dyn IntervalFunction>) -> Self {
        Self {
            interval_fn,
            retry_predicate: None,
        }
    }

    /// The delay before the next attempt, given the zero-indexed attempt
    /// number that just failed.
    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.interval(attempt)
    }

    /// Whether `error` qualifies for a retry at all.
    pub fn should_retry(&self, error: &E) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => true,
        }
    }
}
