/// Middleware modules for the API server
///
/// - `security`: Security response headers
/// - `rate_limit`: Per-client token bucket rate limiting
///
/// Authentication is applied in [`crate::app`] as a route layer.

pub mod rate_limit;
pub mod security;
