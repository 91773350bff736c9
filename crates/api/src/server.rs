//! Service process lifecycle: configuration, database, background tasks,
//! HTTP listener and graceful shutdown.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use kindred_events::NotificationWriter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::middleware::rate_limit;
use crate::router::build_app_router;
use crate::service::Service;
use crate::state::AppState;
use crate::{telemetry, ws};

/// Run one service until SIGINT or SIGTERM.
pub async fn run(service: Service) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init(telemetry::DEFAULT_FILTER);

    // --- Configuration ---
    let config = ServerConfig::from_env(service).context("Invalid configuration")?;
    tracing::info!(
        %service,
        host = %config.host,
        port = config.port,
        rate_limited = config.rate_limit.enabled,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = kindred_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    kindred_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    kindred_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    // --- App state and background tasks ---
    let state = AppState::new(pool.clone(), config);
    let cancel = CancellationToken::new();
    let tasks = spawn_background_tasks(service, &state, &cancel);

    let app = build_app_router(state.clone());

    // --- Start server ---
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, %service, "Starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();

    let ws_count = state.ws_manager.connection_count().await;
    if ws_count > 0 {
        tracing::info!(ws_count, "Closing remaining WebSocket connections");
        state.ws_manager.shutdown_all().await;
    }

    for (name, handle) in tasks {
        match tokio::time::timeout(shutdown_timeout, handle).await {
            Ok(Ok(())) => tracing::info!(task = name, "Background task stopped"),
            Ok(Err(e)) => tracing::warn!(task = name, error = %e, "Background task failed"),
            Err(_) => tracing::warn!(task = name, "Background task did not stop in time"),
        }
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Start the tasks this service needs. Each stops when `cancel` fires.
fn spawn_background_tasks(
    service: Service,
    state: &AppState,
    cancel: &CancellationToken,
) -> Vec<(&'static str, JoinHandle<()>)> {
    let mut tasks = Vec::new();

    if service.publishes_events() {
        tasks.push((
            "notification_writer",
            tokio::spawn(NotificationWriter::run(
                state.pool.clone(),
                state.event_bus.subscribe(),
                cancel.clone(),
            )),
        ));
    }

    if service.serves_websockets() {
        tasks.push((
            "ws_fanout",
            ws::start_fanout(
                Arc::clone(&state.ws_manager),
                state.event_bus.subscribe(),
                cancel.clone(),
            ),
        ));
        tasks.push((
            "ws_heartbeat",
            ws::start_heartbeat(Arc::clone(&state.ws_manager), cancel.clone()),
        ));
    }

    if let Some(limiter) = &state.rate_limiter {
        tasks.push((
            "rate_limit_pruning",
            rate_limit::start_pruning(Arc::clone(limiter), cancel.clone()),
        ));
    }

    tracing::info!(count = tasks.len(), "Background tasks started");
    tasks
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager. If a handler cannot be installed, only the other one is awaited.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
