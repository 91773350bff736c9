use std::sync::Arc;
use std::time::Duration;

use kindred_core::rate_limit::FixedWindowLimiter;
use kindred_events::EventBus;

use crate::config::ServerConfig;
use crate::storage::{LocalStorage, PhotoStorage};
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub pool: kindred_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Centralized event bus for publishing domain events.
    pub event_bus: Arc<EventBus>,
    /// WebSocket connection manager. Empty outside the communication service.
    pub ws_manager: Arc<WsManager>,
    pub storage: Arc<dyn PhotoStorage>,
    /// Present only when rate limiting is enabled for this service.
    pub rate_limiter: Option<Arc<FixedWindowLimiter>>,
}

impl AppState {
    /// Assemble state from config, using local photo storage.
    pub fn new(pool: kindred_db::DbPool, config: ServerConfig) -> Self {
        let storage: Arc<dyn PhotoStorage> =
            Arc::new(LocalStorage::new(&config.media.storage_root));
        let rate_limiter = config.rate_limit.enabled.then(|| {
            Arc::new(FixedWindowLimiter::new(
                Duration::from_secs(config.rate_limit.window_secs),
                config.rate_limit.max_requests,
            ))
        });

        Self {
            pool,
            config: Arc::new(config),
            event_bus: Arc::new(EventBus::default()),
            ws_manager: Arc::new(WsManager::new()),
            storage,
            rate_limiter,
        }
    }
}
