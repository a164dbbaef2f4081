//! Access control: token-claim extraction, role policy guards, and the
//! sliding-window rate limiter gating every ingress.

mod policy;
mod rate_limit;
mod token;

pub use policy::{
    guard_read_distribution, guard_write_distribution, is_status, require_admin, require_root,
    require_write,
};
pub use rate_limit::{
    rate_limit_key, spawn_sweeper, RateLimitOutcome, RateLimiter, RateLimiters,
    DEFAULT_API_LIMIT, DEFAULT_AUTH_LIMIT, RETRY_AFTER_SECS, SWEEP_INTERVAL, WINDOW,
};
pub use token::{authenticate, extract_bearer_token, TokenClaims, TokenValidator};
