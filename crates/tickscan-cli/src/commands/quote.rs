use std::process::ExitCode;

use serde::Serialize;
use tickscan_core::{
    derive_levels, is_valid_risk_percent, CacheMode, Quote, QuoteReconciler, Symbol, TickscanConfig,
    TradeLevels, ValidationError,
};

use crate::cli::QuoteArgs;
use crate::error::CliError;
use crate::output::emit;

#[derive(Debug, Serialize)]
struct QuoteView {
    #[serde(flatten)]
    quote: Quote,
    #[serde(skip_serializing_if = "Option::is_none")]
    levels: Option<TradeLevels>,
}

#[derive(Debug, Serialize)]
struct QuoteOutput {
    quotes: Vec<QuoteView>,
}

pub async fn run(args: &QuoteArgs, config: &TickscanConfig, pretty: bool) -> Result<ExitCode, CliError> {
    // Reject the whole request before any provider call.
    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let risk_percent = risk_percent(args, config)?;
    let mode = if args.fresh { CacheMode::Bypass } else { CacheMode::Use };
    let reconciler = QuoteReconciler::from_config(config);

    let mut quotes = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let quote = reconciler.resolve(symbol, mode).await;
        let levels = derive_levels(&quote, risk_percent);
        quotes.push(QuoteView { quote, levels });
    }

    let any_unavailable = quotes.iter().any(|view| !view.quote.is_available());
    emit(&QuoteOutput { quotes }, pretty)?;

    // Partial success still prints every quote.
    Ok(if any_unavailable {
        ExitCode::from(3)
    } else {
        ExitCode::SUCCESS
    })
}

fn risk_percent(args: &QuoteArgs, config: &TickscanConfig) -> Result<f64, ValidationError> {
    match args.risk_percent {
        Some(value) if !is_valid_risk_percent(value) => Err(ValidationError::InvalidRiskPercent { value }),
        Some(value) => Ok(value),
        None => Ok(config.risk_percent),
    }
}
