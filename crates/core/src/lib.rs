//! Kindred domain core.
//!
//! Pure logic shared by every service, the worker, and the seed tool. This
//! crate performs no I/O: callers pass in the clock and the data.

pub mod api_keys;
pub mod audit;
pub mod error;
pub mod geo;
pub mod hashing;
pub mod matching;
pub mod media;
pub mod profile;
pub mod rate_limit;
pub mod roles;
pub mod search;
pub mod subscription;
pub mod types;
