//! CLI argument definitions for tickscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Reconciled quotes plus heuristic levels |
//! | `scan` | Filter, score and rank a symbol universe |
//! | `session` | Current (or given) market session |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--timezone` | `TICKSCAN_TIMEZONE` | Exchange timezone override |
//! | `--log-json` | `false` | Emit logs as JSON on stderr |
//!
//! # Examples
//!
//! ```bash
//! tickscan quote '$brk.b' btc/usd --pretty
//! tickscan scan --min-price 2 --max-price 50 --min-rvol 2 --top 5
//! tickscan scan --every 300 --scoring gap
//! tickscan session --at 2024-03-11T13:45:00Z
//! ```

use clap::{Args, Parser, Subcommand};

/// Market quote and scanner CLI.
///
/// Reads configuration from `TICKSCAN_*` environment variables (and a `.env`
/// file when present); flags override the environment.
#[derive(Debug, Parser)]
#[command(name = "tickscan", author, version, about = "Market quotes, sessions and momentum scans")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Exchange timezone: America/New_York, UTC or a +HH:MM offset.
    #[arg(long, global = true)]
    pub timezone: Option<String>,

    /// Write logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one or more symbols into reconciled quotes.
    ///
    ///   tickscan quote AAPL
    ///   tickscan quote '$tsla' brk.b eth/usd --risk-percent 1.5
    Quote(QuoteArgs),

    /// Scan a universe and print the top-ranked candidates.
    ///
    ///   tickscan scan --top 5
    ///   tickscan scan --symbols AAPL,AMD,PLTR --min-rvol 1.5 --require-news
    Scan(ScanArgs),

    /// Show the market session for now or a given instant.
    Session(SessionArgs),
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// One or more symbols (cashtags, class shares and pairs accepted).
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    /// Stop distance for the derived levels, in percent.
    #[arg(long)]
    pub risk_percent: Option<f64>,

    /// Skip the quote cache for this call.
    #[arg(long, default_value_t = false)]
    pub fresh: bool,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Comma-separated universe; defaults to TICKSCAN_UNIVERSE or the built-in list.
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Lowest admitted price (inclusive).
    #[arg(long, default_value_t = 1.0)]
    pub min_price: f64,

    /// Highest admitted price (inclusive).
    #[arg(long, default_value_t = 1_000.0)]
    pub max_price: f64,

    /// Minimum session volume.
    #[arg(long, default_value_t = 0)]
    pub min_volume: u64,

    /// Minimum relative volume; omitted disables the check.
    #[arg(long)]
    pub min_rvol: Option<f64>,

    /// Let symbols with unknown relative volume pass the --min-rvol check.
    #[arg(long, default_value_t = false)]
    pub admit_unknown_rvol: bool,

    /// Maximum float (shares); symbols with unknown float are rejected.
    #[arg(long)]
    pub max_float: Option<u64>,

    /// Require a recent news headline.
    #[arg(long, default_value_t = false)]
    pub require_news: bool,

    /// Number of candidates to keep.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Scoring strategy (momentum, gap).
    #[arg(long)]
    pub scoring: Option<String>,

    /// Symbols resolved concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Stop waiting after this many seconds and rank partial results.
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Repeat the scan every N seconds until interrupted.
    #[arg(long)]
    pub every: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// RFC 3339 instant to classify instead of now.
    #[arg(long)]
    pub at: Option<String>,
}
