//! Result-size limits for list endpoints.

/// Rows returned by the transaction feed when `limit` is not given.
pub const DEFAULT_FEED_LIMIT: usize = 50;

/// Largest accepted `limit`.
pub const MAX_FEED_LIMIT: usize = 500;

/// Resolve the effective feed size, clamped to `[0, MAX_FEED_LIMIT]`.
/// An explicit zero is honoured and returns no rows.
pub fn effective_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .min(MAX_FEED_LIMIT)
}
