//! Execution sandbox service binary.
//!
//! Loads configuration, builds the shared [`AppState`], binds the JSON-over-HTTP
//! transport (§6) and serves until a shutdown signal arrives. Platform
//! registration/heartbeat and the binary RPC transport are external
//! collaborators (§1) and are not started here.

mod auth;
mod dto;
mod routes;
mod state;
mod telemetry;

use std::net::SocketAddr;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sandbox_config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load().map_err(|err| {
        tracing::error!(error_code = err.error_code(), "fatal error loading configuration");
        anyhow::anyhow!("configuration load failed: {err}")
    })?;

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind_host, config.server.http_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;

    let state = AppState::build(config).await.map_err(|err| {
        tracing::error!(error_code = err.error_code(), "fatal error during startup wiring");
        anyhow::anyhow!("startup wiring failed: {err}")
    })?;

    let app = build_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "execution sandbox service listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("execution sandbox service shut down cleanly");
    Ok(())
}

/// Builds the full route table: `health`/`capabilities` are open, every
/// other operation in §6 sits behind the `X-API-Key` middleware.
fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(routes::health::health_handler))
        .route("/capabilities", get(routes::health::capabilities_handler));

    let protected = Router::new()
        .route("/v1/execute-sql", post(routes::sql::execute_sql_handler))
        .route("/v1/execute-code", post(routes::code::execute_code_handler))
        .route("/v1/visualizations", post(routes::viz::create_visualization_handler))
        .route(
            "/v1/connections",
            get(routes::connections::list_connections_handler).post(routes::connections::create_connection_handler),
        )
        .route("/v1/connections/:id", delete(routes::connections::delete_connection_handler))
        .route("/v1/connections/test", post(routes::connections::test_connection_handler))
        .route("/v1/connections/:id/sync-schema", post(routes::connections::sync_schema_handler))
        .route("/v1/connections/:id/samples", post(routes::connections::table_samples_handler))
        .layer(from_fn_with_state(state.clone(), auth::api_key_auth_middleware));

    public.merge(protected).layer(telemetry::trace_layer()).layer(telemetry::cors_layer()).with_state(state)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "sandbox_server=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Waits for `SIGINT`/`SIGTERM` so `axum::serve` drains in-flight requests
/// before exiting with status `0` (§6 "0 normal shutdown").
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
