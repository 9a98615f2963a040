//! Error types for rate limiting.

use crate::ActionKind;

/// A request was dropped because it came too soon after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// The message is deliberately generic; clients may retry later.
    #[error("too many requests, please wait")]
    Throttled(ActionKind),
}
