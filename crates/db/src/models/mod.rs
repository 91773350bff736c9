//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - Input DTOs used by the repositories for inserts and patches

pub mod api_key;
pub mod audit;
pub mod matches;
pub mod message;
pub mod notification;
pub mod payment;
pub mod photo;
pub mod processing_job;
pub mod profile;
pub mod role;
pub mod session;
pub mod subscription;
pub mod swipe;
pub mod user;
