mod app;
mod config;
mod routes;
mod services;
mod state;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::services::lot_poller::{self, HttpLotSource};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let map = config::map_settings();
    let poll_interval = config::poll_interval();
    let demo_feed = config::demo_feed_enabled();
    tracing::info!(
        zoom_threshold = map.zoom_threshold,
        poll_interval_ms = map.poll_interval_ms,
        demo_feed,
        "starting parkmap server"
    );

    let state = AppState::new(map, demo_feed);

    if demo_feed {
        tokio::spawn(services::demo_feed::run(state.clone(), poll_interval));
    }

    let data_url = config::data_url();
    tracing::info!(%data_url, "polling occupancy feed");
    let source = HttpLotSource::new(state.http_client.clone(), data_url);
    let poller = lot_poller::start(state.clone(), source, poll_interval);

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Parkmap server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    poller.shutdown().await;
    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
