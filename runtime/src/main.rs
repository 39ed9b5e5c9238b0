use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use rag_runtime::{AppState, bootstrap, chat::SessionRegistry, config, routes, startup};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "Runtime crashed");
        eprintln!("Runtime crashed: {err:#}");
    }
}

async fn run() -> Result<()> {
    startup::init_tracing("info");
    startup::load_env_file(None);

    let config = config::load_config()
        .await
        .context("Failed to load application configuration")?;

    let template = bootstrap::generator_template(&config)
        .await
        .context("Failed to build retrieval engine")?;

    let addr_string = format!("{}:{}", config.server.host, config.server.port);
    let addr = addr_string
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid server address: {addr_string}"))?;
    info!(host = %config.server.host, port = config.server.port, "Loaded configuration");

    let sessions = Arc::new(SessionRegistry::new(template, config.sessions));
    if sessions.spawn_sweeper().is_some() {
        info!(
            idle_ttl_secs = config.sessions.idle_ttl_secs,
            max_sessions = config.sessions.max_sessions,
            "session sweeper started"
        );
    }
    let state = Arc::new(AppState { sessions });

    let app = Router::new()
        .route("/", get(handler))
        .route("/health", get(health))
        .merge(routes::chat_routes())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;
    info!(%addr, "Runtime server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server encountered a fatal error")?;
    Ok(())
}

async fn handler() -> &'static str {
    "Textbook RAG runtime. POST /chat with {\"question\": \"...\"}"
}

#[inline]
async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                if stream.recv().await.is_some() {
                    info!("Received SIGTERM");
                }
            }
            Err(err) => warn!(error = %err, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received termination signal (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received termination signal (SIGTERM)");
        }
    }
}
