//! Dialectic · Philosophy learning backend (AI services)
//!
//! - Axum HTTP API for the concept explainer, question generator and lesson quiz generator
//! - AI calls go through a fixed multi-provider fallback chain (Gemma/Gemini + Mistral)
//!
//! Important env variables:
//!   PORT          : u16 (default 3000)
//!   GEMINI_API_KEY / GOOGLE_API_KEY : enables Google candidates (first non-empty wins)
//!   MISTRAL_API_KEY   : enables Mistral candidates
//!   GEMINI_BASE_URL   : default "https://generativelanguage.googleapis.com/v1beta"
//!   MISTRAL_BASE_URL  : default "https://api.mistral.ai/v1"
//!   AI_TIMEOUT_SECS   : per-candidate timeout, default 120
//!   AGENT_CONFIG_PATH : path to TOML config (prompt overrides)
//!   LOG_LEVEL    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod ai;
mod config;
mod domain;
mod logic;
mod protocol;
mod routes;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::from_env()?);
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "dialectic_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "dialectic_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "dialectic_backend", error = %e, "Failed to listen for Ctrl+C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "dialectic_backend", "Shutdown signal received");
}
