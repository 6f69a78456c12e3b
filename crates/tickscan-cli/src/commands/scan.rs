use std::future::Future;
use std::io;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tickscan_core::{
    QuoteReconciler, ScanFilters, ScanReport, ScanRequest, ScoringPolicy, Symbol, TickscanConfig,
    UniverseScanner, UnknownRvolPolicy,
};
use tracing::info;

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::emit;

pub async fn run(args: &ScanArgs, config: &TickscanConfig, pretty: bool) -> Result<ExitCode, CliError> {
    let request = build_request(args, config)?;
    let scoring = match args.scoring.as_deref() {
        Some(raw) => raw.parse::<ScoringPolicy>()?,
        None => config.scoring,
    };
    let deadline = args
        .deadline_secs
        .map(Duration::from_secs)
        .or(config.scan_deadline);

    let reconciler = Arc::new(QuoteReconciler::from_config(config));
    let scanner = UniverseScanner::new(Arc::clone(&reconciler))
        .with_strategy(scoring.strategy())
        .with_concurrency(args.concurrency.unwrap_or(config.scan_concurrency))
        .with_deadline(deadline);

    let Some(every) = args.every.filter(|secs| *secs > 0).map(Duration::from_secs) else {
        let report = scanner.scan(&request).await;
        emit(&report, pretty)?;
        return Ok(ExitCode::SUCCESS);
    };

    info!(
        interval_secs = every.as_secs(),
        strategy = scanner.strategy_name(),
        "starting scheduled scans"
    );
    run_scheduled(
        &scanner,
        &reconciler,
        &request,
        every,
        tokio::signal::ctrl_c(),
        |report| emit(report, pretty),
    )
    .await
}

/// Scans every `every` until `shutdown` resolves, which also cuts short a
/// scan already in flight.
async fn run_scheduled<F>(
    scanner: &UniverseScanner,
    reconciler: &QuoteReconciler,
    request: &ScanRequest,
    every: Duration,
    shutdown: F,
    mut on_report: impl FnMut(&ScanReport) -> Result<(), CliError>,
) -> Result<ExitCode, CliError>
where
    F: Future<Output = io::Result<()>>,
{
    let mut shutdown = pin!(shutdown);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            signal = &mut shutdown => return interrupted(signal),
        }

        reconciler.cache().clear_expired().await;
        tokio::select! {
            report = scanner.scan(request) => on_report(&report)?,
            signal = &mut shutdown => return interrupted(signal),
        }
    }
}

fn interrupted(signal: io::Result<()>) -> Result<ExitCode, CliError> {
    signal?;
    info!("interrupted; stopping scheduled scans");
    Ok(ExitCode::SUCCESS)
}

fn build_request(args: &ScanArgs, config: &TickscanConfig) -> Result<ScanRequest, CliError> {
    let symbols = if args.symbols.is_empty() {
        config.universe.clone()
    } else {
        args.symbols
            .iter()
            .map(|raw| Symbol::parse(raw))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = ScanFilters {
        price_low: args.min_price,
        price_high: args.max_price,
        min_volume: args.min_volume,
        min_relative_volume: args.min_rvol,
        unknown_rvol: if args.admit_unknown_rvol {
            UnknownRvolPolicy::Admit
        } else {
            UnknownRvolPolicy::Reject
        },
        max_float: args.max_float,
        require_news: args.require_news,
    };

    Ok(ScanRequest::new(symbols, filters, args.top)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use tickscan_core::{
        PartialQuote, ProviderError, ProviderFuture, ProviderId, QuoteProvider, ValidationError,
    };

    fn scan_args(argv: &[&str]) -> ScanArgs {
        let cli = Cli::try_parse_from(argv).expect("valid arguments");
        match cli.command {
            Command::Scan(args) => args,
            other => panic!("expected scan command, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_configured_universe() {
        let config = TickscanConfig::default();
        let request = build_request(&scan_args(&["tickscan", "scan"]), &config).expect("request");
        assert_eq!(request.symbols(), config.universe.as_slice());
    }

    #[test]
    fn inverted_band_is_rejected() {
        let args = scan_args(&["tickscan", "scan", "--min-price", "50", "--max-price", "5"]);
        let error = build_request(&args, &TickscanConfig::default()).expect_err("must fail");
        assert!(matches!(
            error,
            CliError::Validation(ValidationError::InvertedPriceBand { .. })
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn zero_top_is_rejected() {
        let args = scan_args(&["tickscan", "scan", "--top", "0"]);
        let error = build_request(&args, &TickscanConfig::default()).expect_err("must fail");
        assert!(matches!(error, CliError::Validation(ValidationError::ZeroResultCount)));
    }

    struct StalledProvider;

    impl QuoteProvider for StalledProvider {
        fn id(&self) -> ProviderId {
            ProviderId::Yahoo
        }

        fn fetch_quote<'a>(&'a self, _symbol: &'a Symbol) -> ProviderFuture<'a, PartialQuote> {
            Box::pin(std::future::pending::<Result<PartialQuote, ProviderError>>())
        }
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_scan_in_flight() {
        let reconciler = Arc::new(
            QuoteReconciler::builder()
                .provider(Arc::new(StalledProvider))
                .build(),
        );
        let scanner = UniverseScanner::new(Arc::clone(&reconciler));
        let request = ScanRequest::from_raw(&["AAPL"], ScanFilters::default(), 1).expect("valid request");
        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        };
        let mut reports = 0;

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_scheduled(
                &scanner,
                &reconciler,
                &request,
                Duration::from_secs(60),
                shutdown,
                |_| {
                    reports += 1;
                    Ok(())
                },
            ),
        )
        .await
        .expect("shutdown does not wait for the stalled scan");

        outcome.expect("clean stop");
        assert_eq!(reports, 0);
    }
}
