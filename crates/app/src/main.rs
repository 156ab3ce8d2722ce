//! Cutboard - project tracker for a video editing team
//!
//! Headless application shell: builds the tracker context from
//! configuration, resumes any stored session, and runs the
//! reconciliation loop until interrupted. A front end plugs in through
//! the `Renderer`/`Notifier` traits.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cutboard_core::Config;

mod context;
mod notify;
mod reconcile;

use context::Tracker;
use notify::{LogNotifier, LogRenderer};
use reconcile::ReconcileLoop;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Cutboard");

    let config = load_config();
    let tracker = match Tracker::new(config, Arc::new(LogRenderer), Arc::new(LogNotifier)) {
        Ok(tracker) => Arc::new(tracker),
        Err(e) => {
            tracing::error!("Failed to initialize application: {e}");
            std::process::exit(1);
        }
    };

    match tracker.resume().await {
        Some(session) => tracing::info!("resumed session for {}", session.username),
        None => tracker.renderer().render_login(),
    }

    let looper = ReconcileLoop::new(tracker.clone());
    let reconcile_task = tokio::spawn(looper.run());

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
    reconcile_task.abort();
}

/// Config file from `CUTBOARD_CONFIG`, else `cutboard.toml` beside the
/// binary, else built-in defaults.
fn load_config() -> Config {
    let path = std::env::var("CUTBOARD_CONFIG")
        .unwrap_or_else(|_| "cutboard.toml".to_string());
    if std::path::Path::new(&path).exists() {
        match Config::load(&path) {
            Ok(config) => {
                tracing::info!("loaded configuration from {path}");
                return config;
            }
            Err(e) => {
                tracing::error!("invalid configuration {path}: {e}");
                std::process::exit(1);
            }
        }
    }
    tracing::info!("using built-in default configuration");
    Config::default()
}
