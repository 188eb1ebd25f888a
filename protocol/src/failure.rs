use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// Coarse classification of everything that can go wrong in a suggestion
/// cycle. Crate-level error types map onto this via their `kind()` method so
/// callers can decide between absorbing, surfacing, or only logging a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Analysis or search endpoint unreachable or answered with a non-2xx status.
    UpstreamUnavailable,
    /// Analysis exceeded its deadline.
    Timeout,
    /// Local search budget exhausted for the current window.
    RateLimited,
    /// An expected page element was absent.
    SelectorNotFound,
    /// Synthetic file assignment or send activation did not take effect.
    UploadFailed,
}
