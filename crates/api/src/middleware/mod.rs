//! Request extractors and middleware.
//!
//! - [`auth::AuthUser`] -- The caller, from a JWT Bearer token or an `X-Api-Key` header.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`client::ClientInfo`] -- Client address and user agent for audit entries.
//! - [`rate_limit::enforce`] -- Fixed-window limiter keyed by client address.

pub mod auth;
pub mod client;
pub mod rate_limit;
pub mod rbac;
