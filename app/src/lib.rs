//! VCon Labeler Library
//!
//! Host side of the labeler: application state, collaborator adapters,
//! settings and the headless command loop.

pub mod providers;
pub mod settings;
pub mod state;
pub mod worker;

use labeler_types::Settings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use state::{AppState, RegionBridge};

/// Initialize tracing
///
/// Logs go to stderr (stdout carries the command protocol) and, when a log
/// directory is configured, to a daily rolling file. Keep the returned guard
/// alive for the lifetime of the process.
pub fn init_logging(settings: &Settings) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,labeler=debug,labeler_lib=debug,labeler_core=debug".into()),
    );

    let (file_layer, guard) = match settings.log_dir.as_deref() {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "labeler.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if let Some(dir) = settings.log_dir.as_deref() {
        tracing::info!("Logging to files in {}", dir);
    }
    guard
}

/// Run the headless labeler on stdin/stdout
pub async fn run() -> anyhow::Result<()> {
    let settings = settings::load_settings();
    let _guard = init_logging(&settings);

    tracing::info!("Starting VCon Labeler {}", env!("CARGO_PKG_VERSION"));

    let state = AppState::local(settings);
    worker::run_worker(state).await
}
