//! Kindred HTTP service library.
//!
//! Every service binary is a thin wrapper around [`server::run`] with its
//! [`Service`](service::Service). Config, state, error handling, auth,
//! middleware, routes and OpenAPI documents live here so integration tests
//! and the binaries share them.

pub mod auth;
pub mod config;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod server;
pub mod service;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod ws;
