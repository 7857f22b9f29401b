mod config;

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{info, warn};

use parley_api::{AppStateInner, rate_limit};
use parley_db::Database;

use crate::config::Config;

/// How often the rate limiter forgets clients that went quiet.
const LIMITER_PURGE_EVERY: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_server=debug,parley_api=debug,parley_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_placeholder_secret() {
        warn!("PARLEY_JWT_SECRET is unset or still a placeholder; set it before exposing this server");
    }
    if let Some(hours) = config.settings.chat_hours {
        info!("Chat routes open {:02}:00-{:02}:00 local time", hours.start, hours.end);
    }

    // Init database
    let db = Database::open(&config.db_path)?;

    let state = AppStateInner::new(db, config.settings);
    tokio::spawn(rate_limit::run_purge_loop(state.clone(), LIMITER_PURGE_EVERY));

    let app = parley_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
