//! `classify_error(http_status, body) -> {TRANSIENT, PERMANENT, RATE_LIMITED, OUTAGE}`
//! (spec.md §6), including recognition of known outage signatures such as
//! Cloudflare's 522/523 HTML error pages.

use vpcp_types::OutageSignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    Transient,
    Permanent,
    RateLimited,
    Outage,
}

/// Classifies an HTTP response using a provider's configured outage
/// signatures plus the generic status-code rules every provider shares.
///
/// Outage signatures take priority over the generic 5xx rule: a 523 with
/// a matching body is an `Outage`, not a generic `Transient` 5xx, because
/// an outage immediately marks the provider `UNHEALTHY` (spec.md §4.4)
/// while a transient 5xx only counts toward the failure-rate window.
pub fn classify_http(
    status: u16,
    body: &str,
    known_outage_signatures: &[OutageSignature],
) -> ErrorClassification {
    for sig in known_outage_signatures {
        if sig.status == status && body.contains(&sig.body_contains) {
            return ErrorClassification::Outage;
        }
    }

    match status {
        429 => ErrorClassification::RateLimited,
        500..=599 => ErrorClassification::Transient,
        400..=499 => ErrorClassification::Permanent,
        _ => ErrorClassification::Transient,
    }
}
