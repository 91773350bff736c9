//! Kindred in-process events.
//!
//! - [`EventBus`] -- publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`] -- the domain event envelope.
//! - [`NotificationWriter`] -- background task turning events into
//!   `notifications` rows.

pub mod bus;
pub mod notifier;

pub use bus::{event_types, EventBus, PlatformEvent};
pub use notifier::NotificationWriter;
