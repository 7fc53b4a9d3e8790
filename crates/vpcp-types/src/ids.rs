//! Newtype identifiers so a `request_id` and a `provider_job_id` can never
//! be swapped at a call site by accident.

use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(RequestId);
uuid_id!(ProviderJobId);
uuid_id!(ReservationId);

/// Deterministic id for requests produced by the Daily Scheduler.
///
/// Not a UUID: replanning the same date must reproduce identical ids
/// (spec.md §4.6 "Idempotency"), so this is a stable formatted string
/// rather than a random value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ScheduledRequestKey(String);

impl ScheduledRequestKey {
    pub fn new(date: time::Date, batch_index: usize, within_batch_index: usize) -> Self {
        Self(format!("{date}-b{batch_index}-i{within_batch_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RequestId {
    /// Derives a `RequestId` deterministically from a `ScheduledRequestKey`
    /// (spec.md §4.6 "Idempotency... use a deterministic id schema"), via
    /// UUIDv5 rather than the random v4 `new()` every other call site uses.
    /// Replanning the same date reproduces identical `request_id`s.
    pub fn from_scheduled_key(key: &ScheduledRequestKey) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_str().as_bytes()))
    }
}

impl fmt::Display for ScheduledRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
