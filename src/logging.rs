use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directory the rolling log files are written to.
pub const LOG_DIR: &str = "logs";

/// Sets up file logging for the session.
///
/// The terminal belongs to the TUI, so everything goes to a daily rolling
/// `logs/ulat.log`. `RUST_LOG` can add directives on top of the INFO default.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn initialize_logging() -> WorkerGuard {
    if let Err(e) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("Could not create {} directory: {}", LOG_DIR, e);
    }

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "ulat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!("Logging initialized successfully.");
    guard
}
