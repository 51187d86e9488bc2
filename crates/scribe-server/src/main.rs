mod config;

use std::sync::Arc;

use tracing::{info, warn};

use scribe_api::auth::{AppState, AppStateInner};
use scribe_core::Notes;
use scribe_db::Database;
use scribe_search::NoteIndex;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init store and index
    let db = Database::open(&config.db_path)?;
    let index = NoteIndex::open_or_create(&config.index_path)?;
    info!(
        "Store at {}, index at {} ({} documents)",
        config.db_path.display(),
        config.index_path.display(),
        index.doc_count()
    );

    let notes = Notes::new(db, index);
    let pending = notes.pending_index_count()?;
    if pending > 0 {
        warn!(
            "{} notes are missing from the search index; run `scribe-indexer repair`",
            pending
        );
    }

    let state: AppState = Arc::new(AppStateInner {
        notes,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
        request_timeout: config.request_timeout,
    });
    let app = scribe_api::router(state);

    let addr = config.socket_addr()?;
    info!("Scribe server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
