//! Phone agent server entry point

use tracing_subscriber::EnvFilter;

use phone_agent_config::{load_settings, Settings};
use phone_agent_server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("PHONE_AGENT_ENV").ok();
    let settings = load_settings(env.as_deref())?;

    init_tracing(&settings);
    tracing::info!("starting phone agent v{}", env!("CARGO_PKG_VERSION"));

    // Everything the calls share is built here; a model that fails to
    // load means the process never accepts a call.
    let state = AppState::initialize(settings)?;
    tracing::info!("engines initialized, accepting calls");

    // Transport adapters (call-control client, media endpoint) attach
    // to `state.calls` and drive it with CallEvents; the process
    // itself just waits for shutdown.
    shutdown_signal().await;

    tracing::info!(
        active_calls = state.calls.active_calls(),
        "shutting down"
    );
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("phone_agent={}", settings.observability.log_level))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.observability.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
