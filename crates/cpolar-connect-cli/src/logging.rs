//! Logging initialization.
//!
//! Level precedence: `CPOLAR_LOG_LEVEL` env var, then `log_level` from the
//! settings file, then `info`. Events always go to the append-only log
//! file under `~/.cpolar-connect/logs/`; they also go to stderr unless
//! `--quiet` was passed.

use std::fs;
use std::sync::Arc;

use cpolar_connect::config::{self, ConfigManager, DEFAULT_LOG_LEVEL};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that overrides the configured log level.
pub const LOG_LEVEL_ENV_VAR: &str = "CPOLAR_LOG_LEVEL";

/// Install the global subscriber. Called once from `main`.
pub fn init(quiet: bool) {
    let level = std::env::var(LOG_LEVEL_ENV_VAR)
        .ok()
        .or_else(|| {
            ConfigManager::new()
                .ok()
                .and_then(|manager| manager.load().ok())
                .map(|settings| settings.log_level)
        })
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let file_layer = open_log_file().map(|file| fmt::layer().with_writer(file).with_ansi(false));
    let stderr_layer = (!quiet).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

/// Open the append-only log file. `None` (no file logging) when the home
/// directory cannot be determined or the file cannot be created.
fn open_log_file() -> Option<Arc<fs::File>> {
    let dir = config::logs_dir()?;
    fs::create_dir_all(&dir).ok()?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("cpolar-connect.log"))
        .ok()?;
    Some(Arc::new(file))
}
