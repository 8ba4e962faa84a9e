//! Toxiscope server.
//!
//! # API Endpoints
//!
//! - `POST /control` - Start or stop the analysis session
//! - `POST /mutations` - Submit a batch of DOM changes
//! - `GET /overlay` - Current overlay contents
//! - `GET|PUT /settings` - Persisted settings
//! - `GET /history` - Recent analysis verdicts
//! - `GET /relay/ws` - Reddit analysis relay (WebSocket)
//! - `POST /relay/analysis` - Publish a Reddit analysis
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use toxiscope::api::{AppState, router};
use toxiscope::classifier::GeminiClient;
use toxiscope::config::ServiceConfig;
use toxiscope::overlay::Overlay;
use toxiscope::relay::{RelayClient, RelayHub};
use toxiscope::session::AnalysisSession;
use toxiscope::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default level stays at INFO; debug traces include extraction details
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("toxiscope=info".parse()?))
        .init();

    let config = ServiceConfig::from_env();
    info!(
        port = config.port,
        db_url = %config.database_url,
        model = %config.gemini_model,
        relay = config.relay_url.is_some(),
        "Starting Toxiscope server"
    );

    let storage = Storage::new(&config.database_url)
        .await?
        .with_history_retention(config.history_retention);
    info!("Database initialized");

    let classifier = GeminiClient::with_base_url(&config.gemini_base_url)
        .with_model(&config.gemini_model)
        .with_timeout(config.request_timeout);

    let overlay = Overlay::new();
    let session = AnalysisSession::new(Arc::new(classifier), overlay.clone(), Some(storage.clone()));
    let hub = RelayHub::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_task = config.relay_url.as_deref().map(|url| {
        tokio::spawn(RelayClient::new(url, overlay.clone()).run(shutdown_rx.clone()))
    });

    let state = AppState {
        session,
        storage,
        hub,
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Toxiscope is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = relay_task {
        let _ = task.await;
    }

    Ok(())
}
