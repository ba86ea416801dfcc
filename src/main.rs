mod api;
mod bff;
mod cache;
mod cached_client;
mod cli;
mod config;
mod debounce;
mod error;
mod logging;
mod query;
mod session;
mod tree;
mod view;

#[cfg(test)]
mod test_support;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::process::ExitCode;

use cli::Command;
use error::ApiError;

#[derive(Parser, Debug)]
#[command(name = "stockpile")]
#[command(about = "Inventory dashboard server and command-line client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/stockpile/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;

  if let Command::Serve = args.command {
    logging::init_stdout()?;
    bff::serve(&config.bff).await?;
    return Ok(ExitCode::SUCCESS);
  }

  let _guard = logging::init_file()?;
  match cli::run(args.command, &config).await {
    Ok(()) => Ok(ExitCode::SUCCESS),
    Err(report) => match report.downcast_ref::<ApiError>() {
      // Service errors are already user-facing messages.
      Some(e) => {
        tracing::warn!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        Ok(ExitCode::FAILURE)
      }
      None => Err(report),
    },
  }
}
