//! Runtime configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `TICKSCAN_POLYGON_API_KEY` (fallback `POLYGON_API_KEY`) | unset | Polygon key; absent means Polygon reports `NotConfigured` |
//! | `TICKSCAN_TOLERANCE_BPS` | `50` | Cross-provider discrepancy tolerance |
//! | `TICKSCAN_TIMEZONE` | `America/New_York` | Exchange timezone |
//! | `TICKSCAN_UNIVERSE` | built-in list | Comma-separated scan universe |
//! | `TICKSCAN_PROVIDER_ORDER` | `polygon,yahoo` | Provider priority |
//! | `TICKSCAN_REQUEST_TIMEOUT_MS` | `8000` | Per-call timeout, 6000..=10000 |
//! | `TICKSCAN_MAX_RETRIES` | `1` | Retries per call, 1..=2 |
//! | `TICKSCAN_RETRY_DELAY_MS` | `400` | Base retry delay, jittered |
//! | `TICKSCAN_MIN_CALL_GAP_MS` | `250` | Minimum gap between calls to one provider |
//! | `TICKSCAN_SCAN_CONCURRENCY` | `4` | Symbols in flight during a scan |
//! | `TICKSCAN_SCAN_DEADLINE_SECS` | unset | Optional scan deadline |
//! | `TICKSCAN_CACHE_TTL_SECS` | `0` | Quote cache TTL, `0` disables |
//! | `TICKSCAN_SCORING` | `momentum` | Scan scoring strategy |
//! | `TICKSCAN_RISK_PERCENT` | `2.0` | Stop distance for trading levels |

use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, Map as ConfigMap};
use serde::Deserialize;

use crate::levels::{is_valid_risk_percent, DEFAULT_RISK_PERCENT};
use crate::retry::{Backoff, RetryConfig, MAX_RETRIES_CAP};
use crate::scanner::ScoringPolicy;
use crate::session::ExchangeTimezone;
use crate::{CoreError, ProviderId, Symbol, ValidationError};

const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "TSLA", "AMD", "META", "AMZN", "GOOGL", "NFLX", "PLTR", "SOFI",
    "COIN", "MARA", "RIOT", "SPY", "QQQ", "IWM", "BTC-USD", "ETH-USD",
];

const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 6_000..=10_000;

#[derive(Clone, PartialEq)]
pub struct TickscanConfig {
    pub polygon_api_key: Option<String>,
    pub tolerance_bps: u32,
    pub timezone: ExchangeTimezone,
    pub universe: Vec<Symbol>,
    pub provider_order: Vec<ProviderId>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub min_call_gap: Duration,
    pub scan_concurrency: usize,
    pub scan_deadline: Option<Duration>,
    pub cache_ttl: Duration,
    pub scoring: ScoringPolicy,
    pub risk_percent: f64,
}

impl Default for TickscanConfig {
    fn default() -> Self {
        Self {
            polygon_api_key: None,
            tolerance_bps: 50,
            timezone: ExchangeTimezone::UsEastern,
            universe: default_universe(),
            provider_order: ProviderId::ALL.to_vec(),
            request_timeout: Duration::from_millis(8_000),
            max_retries: 1,
            retry_delay: Duration::from_millis(400),
            min_call_gap: Duration::from_millis(250),
            scan_concurrency: 4,
            scan_deadline: None,
            cache_ttl: Duration::ZERO,
            scoring: ScoringPolicy::Momentum,
            risk_percent: DEFAULT_RISK_PERCENT,
        }
    }
}

impl Debug for TickscanConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickscanConfig")
            .field("polygon_api_key", &self.polygon_api_key.as_ref().map(|_| "***"))
            .field("tolerance_bps", &self.tolerance_bps)
            .field("timezone", &self.timezone)
            .field("universe", &self.universe.len())
            .field("provider_order", &self.provider_order)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("min_call_gap", &self.min_call_gap)
            .field("scan_concurrency", &self.scan_concurrency)
            .field("scan_deadline", &self.scan_deadline)
            .field("cache_ttl", &self.cache_ttl)
            .field("scoring", &self.scoring)
            .field("risk_percent", &self.risk_percent)
            .finish()
    }
}

/// `TICKSCAN_*` values as the environment source delivers them, before
/// domain parsing.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default)]
    polygon_api_key: Option<String>,
    tolerance_bps: u32,
    timezone: String,
    #[serde(default)]
    universe: Option<String>,
    provider_order: String,
    request_timeout_ms: u64,
    max_retries: u32,
    retry_delay_ms: u64,
    min_call_gap_ms: u64,
    scan_concurrency: usize,
    #[serde(default)]
    scan_deadline_secs: Option<u64>,
    cache_ttl_secs: u64,
    scoring: String,
    risk_percent: f64,
}

impl EnvSettings {
    fn load(vars: ConfigMap<String, String>) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("tolerance_bps", 50)?
            .set_default("timezone", "America/New_York")?
            .set_default("provider_order", "polygon,yahoo")?
            .set_default("request_timeout_ms", 8_000)?
            .set_default("max_retries", 1)?
            .set_default("retry_delay_ms", 400)?
            .set_default("min_call_gap_ms", 250)?
            .set_default("scan_concurrency", 4)?
            .set_default("cache_ttl_secs", 0)?
            .set_default("scoring", "momentum")?
            .set_default("risk_percent", DEFAULT_RISK_PERCENT)?
            .add_source(Environment::with_prefix("TICKSCAN").source(Some(vars)))
            .build()?
            .try_deserialize()
    }
}

impl TickscanConfig {
    /// Reads `TICKSCAN_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Environment`] when a relevant variable is not
    /// unicode, [`CoreError::Config`] for a value of the wrong type, and
    /// [`CoreError::Validation`] for a value outside its allowed range.
    pub fn from_env() -> Result<Self, CoreError> {
        let mut vars = Vec::new();
        for (key, value) in std::env::vars_os() {
            let Some(key) = key.to_str().map(str::to_owned) else {
                continue;
            };
            if !(key.starts_with("TICKSCAN_") || key == "POLYGON_API_KEY") {
                continue;
            }
            let value = value.into_string().map_err(|_| CoreError::Environment { key: key.clone() })?;
            vars.push((key, value));
        }
        Self::from_vars(vars)
    }

    /// Same as [`from_env`](Self::from_env) over an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: ConfigMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key, value.trim().to_owned()))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        let fallback_key = vars.get("POLYGON_API_KEY").cloned();

        let settings = EnvSettings::load(vars).map_err(|error| CoreError::Config {
            reason: error.to_string(),
        })?;

        let config = Self {
            polygon_api_key: settings.polygon_api_key.or(fallback_key),
            tolerance_bps: settings.tolerance_bps,
            timezone: ExchangeTimezone::from_str(&settings.timezone)?,
            universe: match settings.universe {
                Some(raw) => parse_symbol_list(&raw)?,
                None => default_universe(),
            },
            provider_order: parse_provider_order(&settings.provider_order)?,
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            min_call_gap: Duration::from_millis(settings.min_call_gap_ms),
            scan_concurrency: settings.scan_concurrency,
            scan_deadline: settings
                .scan_deadline_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
            scoring: ScoringPolicy::from_str(&settings.scoring)?,
            risk_percent: settings.risk_percent,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges. Called by `from_env`; call it again after
    /// applying overrides.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let timeout_ms = self.request_timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        if !TIMEOUT_RANGE_MS.contains(&timeout_ms) {
            return Err(invalid(
                "TICKSCAN_REQUEST_TIMEOUT_MS",
                timeout_ms,
                "must be between 6000 and 10000",
            ));
        }
        if !(1..=MAX_RETRIES_CAP).contains(&self.max_retries) {
            return Err(invalid("TICKSCAN_MAX_RETRIES", self.max_retries, "must be 1 or 2"));
        }
        if self.scan_concurrency == 0 {
            return Err(invalid(
                "TICKSCAN_SCAN_CONCURRENCY",
                self.scan_concurrency,
                "must be at least 1",
            ));
        }
        if self.provider_order.is_empty() {
            return Err(invalid("TICKSCAN_PROVIDER_ORDER", "", "must name at least one provider"));
        }
        if !is_valid_risk_percent(self.risk_percent) {
            return Err(invalid(
                "TICKSCAN_RISK_PERCENT",
                self.risk_percent,
                "must be greater than 0 and less than 50",
            ));
        }
        Ok(())
    }

    pub fn with_polygon_api_key(mut self, key: impl Into<String>) -> Self {
        self.polygon_api_key = Some(key.into());
        self
    }

    pub fn with_tolerance_bps(mut self, tolerance_bps: u32) -> Self {
        self.tolerance_bps = tolerance_bps;
        self
    }

    pub fn with_timezone(mut self, timezone: ExchangeTimezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_universe(mut self, universe: Vec<Symbol>) -> Self {
        self.universe = universe;
        self
    }

    pub fn with_provider_order(mut self, provider_order: Vec<ProviderId>) -> Self {
        self.provider_order = provider_order;
        self
    }

    pub fn with_scan_concurrency(mut self, scan_concurrency: usize) -> Self {
        self.scan_concurrency = scan_concurrency;
        self
    }

    pub fn with_scan_deadline(mut self, scan_deadline: Option<Duration>) -> Self {
        self.scan_deadline = scan_deadline;
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringPolicy) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_min_call_gap(mut self, min_call_gap: Duration) -> Self {
        self.min_call_gap = min_call_gap;
        self
    }

    /// Retry settings for every adapter call.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.min(MAX_RETRIES_CAP),
            backoff: Backoff::Jittered {
                base: self.retry_delay,
                jitter: self.retry_delay / 2,
            },
            timeout: self.request_timeout,
        }
    }
}

/// Built-in scan universe used when none is configured.
pub fn default_universe() -> Vec<Symbol> {
    DEFAULT_UNIVERSE
        .iter()
        .filter_map(|raw| Symbol::parse(raw).ok())
        .collect()
}

/// Parses a comma- or whitespace-separated symbol list.
pub fn parse_symbol_list(raw: &str) -> Result<Vec<Symbol>, ValidationError> {
    raw.split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(Symbol::parse)
        .collect()
}

/// Parses a provider priority list, dropping repeats.
pub fn parse_provider_order(raw: &str) -> Result<Vec<ProviderId>, ValidationError> {
    let mut order = Vec::new();
    for part in raw.split(',').filter(|part| !part.trim().is_empty()) {
        let provider = ProviderId::from_str(part)?;
        if !order.contains(&provider) {
            order.push(provider);
        }
    }
    Ok(order)
}

fn invalid(key: &'static str, value: impl ToString, reason: &'static str) -> ValidationError {
    ValidationError::InvalidConfig {
        key,
        value: value.to_string(),
        reason,
    }
}
