mod quote;
mod scan;
mod session;

use std::process::ExitCode;

use tickscan_core::{ExchangeTimezone, TickscanConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = load_config(cli)?;

    match &cli.command {
        Command::Quote(args) => quote::run(args, &config, cli.pretty).await,
        Command::Scan(args) => scan::run(args, &config, cli.pretty).await,
        Command::Session(args) => session::run(args, &config, cli.pretty),
    }
}

/// Environment first, then global flag overrides.
fn load_config(cli: &Cli) -> Result<TickscanConfig, CliError> {
    let mut config = TickscanConfig::from_env()?;
    if let Some(raw) = cli.timezone.as_deref() {
        config = config.with_timezone(raw.parse::<ExchangeTimezone>()?);
    }
    Ok(config)
}
