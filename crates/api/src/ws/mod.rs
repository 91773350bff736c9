//! WebSocket infrastructure for real-time chat delivery.
//!
//! Provides connection management, heartbeat, the authenticated upgrade
//! handler, and the fan-out task that pushes bus events to sockets.

mod fanout;
pub mod handler;
mod heartbeat;
pub mod manager;

pub use fanout::{frame_for, start_fanout};
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
