mod accounts;
mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod prefs;
mod sync;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vdiary")]
#[command(about = "Offline-first client for a voice diary")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/vdiary/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend url, overrides the config file
  #[arg(long)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: commands::Command,
}

/// Log to a file in the data directory; stdout is for command output.
fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::never(log_dir, "vdiary.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("VDIARY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override api url if specified on command line
  let config = if let Some(url) = args.api_url {
    config::Config {
      api: config::ApiConfig { url, ..config.api },
      ..config
    }
  } else {
    config
  };

  let _log_guard = init_logging(&config.data_dir()?)?;

  // Initialize and run the app
  let mut app = app::App::new(config).await?;
  app.run(args.command).await?;

  Ok(())
}
