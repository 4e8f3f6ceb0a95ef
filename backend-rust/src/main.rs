mod config;
mod error;
mod handlers;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use handlers::{on_connect, router};
use state::AppState;

// ─── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "egress-backend", about = "Indoor egress guidance server")]
struct Args {
    /// Building description (falls back to the embedded reference building)
    #[arg(short, long, default_value = "building.toml")]
    config: PathBuf,
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "egress_backend=info,egress_core=info,socketioxide=warn".into()
            }),
        )
        .init();

    let args = Args::parse();
    info!("🚪 Egress guidance backend starting...");

    let building = config::load_building(&args.config).await?;

    // Build Socket.IO layer
    let (socket_layer, io) = SocketIo::builder().build_layer();
    let state = AppState::new(&building, io.clone())?;

    let state_sock = state.clone();
    io.ns("/", move |socket: SocketRef| {
        let state = state_sock.clone();
        async move {
            on_connect(socket, state).await;
        }
    });

    // CORS: any origin, the mobile app and dashboards are served elsewhere
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(socket_layer).layer(cors);

    let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("0.0.0.0:{port}");
    info!("🚀 Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
