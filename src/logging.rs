use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "stockpile=info";

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log to stdout. Used by the server.
pub fn init_stdout() -> Result<()> {
  fmt()
    .with_env_filter(env_filter())
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))
}

/// Log to a daily rolling file so command output stays clean.
///
/// The returned guard flushes the writer on drop; hold it until exit.
pub fn init_file() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("stockpile")
    .join("logs");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "stockpile.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  fmt()
    .with_env_filter(env_filter())
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
  Ok(guard)
}
