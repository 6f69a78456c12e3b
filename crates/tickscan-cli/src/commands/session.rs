use std::process::ExitCode;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tickscan_core::{classify, Clock, SessionSnapshot, SystemClock, TickscanConfig};

use crate::cli::SessionArgs;
use crate::error::CliError;
use crate::output::emit;

#[derive(Debug, Serialize)]
struct SessionView {
    timezone: String,
    #[serde(flatten)]
    snapshot: SessionSnapshot,
}

pub fn run(args: &SessionArgs, config: &TickscanConfig, pretty: bool) -> Result<ExitCode, CliError> {
    let at = match args.at.as_deref() {
        Some(raw) => OffsetDateTime::parse(raw, &Rfc3339).map_err(|error| CliError::Timestamp {
            value: raw.to_owned(),
            reason: error.to_string(),
        })?,
        None => SystemClock.now(),
    };

    let view = SessionView {
        timezone: config.timezone.to_string(),
        snapshot: classify(at, config.timezone),
    };
    emit(&view, pretty)?;
    Ok(ExitCode::SUCCESS)
}
