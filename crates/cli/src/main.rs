use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use rentdesk_cli::Cli;
use rentdesk_core::config::{AppConfig, LogFormat, LoggingConfig};

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow!(error))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Config errors are reported by the command itself; logging falls back to defaults.
    let logging = AppConfig::load(cli.load_options())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init_logging(&logging)?;

    Ok(rentdesk_cli::execute(cli))
}
