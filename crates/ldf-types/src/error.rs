//! Error taxonomy shared by every crate in the workspace.
//!
//! `ErrorKind` is a closed set of categories (not a full error type) that
//! every subsystem maps its failures onto, so the HTTP layer can pick a
//! status code and the retry logic can decide whether to back off or give
//! up without needing to understand the originating subsystem.

use std::fmt;

/// Category of failure. Mirrors the shape of `shipper_types::ErrorClass`
/// (`Retryable`/`Permanent`/`Ambiguous`) but with the finer granularity the
/// HTTP control plane needs to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, unknown version rule, invalid confirmation token.
    Validation,
    /// Missing or invalid bearer token.
    Unauthorized,
    /// Valid token, insufficient capability.
    Forbidden,
    /// Entity does not exist, or exists but must be masked as absent.
    NotFound,
    /// Conflicting state transition (sync already running, duplicate name).
    Conflict,
    /// Forge API unreachable or returned a non-2xx response.
    UpstreamUnavailable,
    /// Storage backend not configured, or its `ping()` failed.
    StorageUnavailable,
    /// Transient internal error (network hiccup, lock contention); safe to retry.
    TransientInternal,
    /// User-initiated cancellation. Terminal, not a failure.
    Cancelled,
    /// Sliding-window rate limit exceeded.
    RateLimited,
}

impl ErrorKind {
    /// HTTP status code this kind maps to in the `{error, code, message}` envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::UpstreamUnavailable => 502,
            ErrorKind::StorageUnavailable => 503,
            ErrorKind::TransientInternal => 500,
            ErrorKind::Cancelled => 499,
            ErrorKind::RateLimited => 429,
        }
    }

    /// Whether a caller should retry this error internally rather than surface it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientInternal | ErrorKind::UpstreamUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::TransientInternal => "transient_internal",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RateLimited => "rate_limited",
        };
        write!(f, "{s}")
    }
}

/// A categorized error carrying a human-readable message.
///
/// Subsystems that need to cross an API boundary (storage, forge discovery,
/// the HTTP layer) return this instead of `anyhow::Error`, so their callers
/// can branch on `kind()` per §7 of the specification. Internal plumbing
/// within a single crate still uses `anyhow::Result` the way the rest of
/// the workspace does.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct LdfError {
    pub kind: ErrorKind,
    pub message: String,
}

impl LdfError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, message)
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageUnavailable, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientInternal, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec_table() {
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::Unauthorized.http_status(), 401);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::UpstreamUnavailable.http_status(), 502);
        assert_eq!(ErrorKind::StorageUnavailable.http_status(), 503);
        assert_eq!(ErrorKind::RateLimited.http_status(), 429);
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::TransientInternal.is_retryable());
        assert!(ErrorKind::UpstreamUnavailable.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }
}
