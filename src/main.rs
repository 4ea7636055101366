//! Code Loom · classroom "find the bug" quiz backend
//!
//! - Axum HTTP + WebSocket API driving the roster/turn state machine
//! - Optional LLM integration (Gemini or OpenAI-compatible) for challenges and grading
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT             : u16 (default 3000)
//!   LLM_PROVIDER     : "gemini" | "openai" (default: first provider with a key)
//!   GEMINI_API_KEY   : enables Gemini
//!   GEMINI_BASE_URL  : default "https://generativelanguage.googleapis.com"
//!   GEMINI_MODEL     : default "gemini-2.0-flash"
//!   OPENAI_API_KEY   : enables OpenAI
//!   OPENAI_BASE_URL  : default "https://api.openai.com/v1"
//!   OPENAI_MODEL     : default "gpt-4o-mini"
//!   QUIZ_CONFIG_PATH : path to TOML config (prompts + syllabus topics)
//!   LOG_LEVEL        : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod errors;
mod config;
mod seeds;
mod controller;
mod gateway;
mod openai;
mod gemini;
mod clock;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (session registry, gateway, clock).
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "code_loom", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "code_loom", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "code_loom", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "code_loom", "Shutdown signal received");
}
