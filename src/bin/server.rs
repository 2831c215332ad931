//! ACDL registry HTTP server binary.
//!
//! Starts an axum HTTP server exposing agent registration, discovery, and
//! matching over JSON.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `ACDL_TTL_SECS` — registration TTL in seconds (default: 600)
//! - `ACDL_MANIFEST_DIR` — optional directory of YAML/JSON manifests to
//!   seed the registry from at startup
//! - `RUST_LOG` — Tracing filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin acdl-server
//! ```

use std::sync::Arc;

use acdl_registry::config::ServerConfig;
use acdl_registry::registry::Registry;
use acdl_registry::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,acdl_registry=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let registry = Arc::new(Registry::with_ttl(config.ttl));

    if let Some(dir) = &config.manifest_dir {
        match registry.load_directory(dir) {
            Ok(count) => tracing::info!(count, dir = %dir.display(), "seeded registry from manifest dir"),
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "manifest dir seeding failed"),
        }
    }

    let state = AppState::with_registry(registry);
    let app = app_router(state);

    let bind_addr = config.bind_addr();
    tracing::info!("acdl-registry server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health         — liveness probe");
    tracing::info!("  POST /acdl/register  — register an agent manifest");
    tracing::info!("  POST /acdl/discover  — multi-criteria discovery");
    tracing::info!("  POST /acdl/match     — task/requirement matching");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
