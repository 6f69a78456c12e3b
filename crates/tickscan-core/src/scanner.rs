//! Universe scanning: resolve, filter, score and rank a list of symbols.
//!
//! | Stage | Rule |
//! |-------|------|
//! | price band | `low <= price <= high` |
//! | volume | `volume >= min_volume` |
//! | relative volume | `rvol >= min`; unknown handled by [`UnknownRvolPolicy`] |
//! | float | `float <= max`; unknown float fails |
//! | news | a headline must exist |
//!
//! Filters run in that order and stop at the first rejection, so the
//! optional float and news calls are only made for symbols that survived
//! the cheaper checks.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::pin::pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheMode;
use crate::reconcile::QuoteReconciler;
use crate::rvol::relative_volume;
use crate::{Quote, ScanCandidate, Symbol, ValidationError};

/// What to do with a symbol whose relative volume cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRvolPolicy {
    #[default]
    Reject,
    Admit,
}

/// Quote-derived candidate filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFilters {
    pub price_low: f64,
    pub price_high: f64,
    pub min_volume: u64,
    /// `None` disables the relative-volume stage.
    pub min_relative_volume: Option<f64>,
    pub unknown_rvol: UnknownRvolPolicy,
    pub max_float: Option<u64>,
    pub require_news: bool,
}

impl Default for ScanFilters {
    fn default() -> Self {
        Self {
            price_low: 0.0,
            price_high: f64::MAX,
            min_volume: 0,
            min_relative_volume: None,
            unknown_rvol: UnknownRvolPolicy::Reject,
            max_float: None,
            require_news: false,
        }
    }
}

impl ScanFilters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.price_low.is_nan() || self.price_high.is_nan() || self.price_low > self.price_high {
            return Err(ValidationError::InvertedPriceBand {
                low: self.price_low,
                high: self.price_high,
            });
        }
        Ok(())
    }
}

/// Symbols, filters and the number of results to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    symbols: Vec<Symbol>,
    filters: ScanFilters,
    top_n: usize,
}

impl ScanRequest {
    /// Builds a request, dropping repeated symbols after their first occurrence.
    ///
    /// # Errors
    ///
    /// Fails on a zero result count or an inverted price band.
    pub fn new(symbols: Vec<Symbol>, filters: ScanFilters, top_n: usize) -> Result<Self, ValidationError> {
        if top_n == 0 {
            return Err(ValidationError::ZeroResultCount);
        }
        filters.validate()?;

        let mut seen = HashSet::with_capacity(symbols.len());
        let symbols = symbols
            .into_iter()
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect();

        Ok(Self {
            symbols,
            filters,
            top_n,
        })
    }

    /// Parses raw symbols first; any malformed entry fails the request.
    pub fn from_raw<S: AsRef<str>>(
        raw: &[S],
        filters: ScanFilters,
        top_n: usize,
    ) -> Result<Self, ValidationError> {
        let symbols = raw
            .iter()
            .map(|value| Symbol::parse(value.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(symbols, filters, top_n)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn filters(&self) -> &ScanFilters {
        &self.filters
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }
}

/// Scoring strategy for ranking candidates.
///
/// Implementations must be deterministic and return a finite score that is
/// non-decreasing in both change percent and relative volume.
pub trait ScoreStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, quote: &Quote, relative_volume: Option<f64>) -> f64;
}

/// `2 * rvol + change_percent`; unknown relative volume contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentumScore;

impl ScoreStrategy for MomentumScore {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn score(&self, quote: &Quote, relative_volume: Option<f64>) -> f64 {
        let rvol = relative_volume.filter(|value| value.is_finite()).unwrap_or(0.0);
        finite_or_zero(2.0 * rvol + quote.change_percent)
    }
}

/// Ranks by change percent alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapScore;

impl ScoreStrategy for GapScore {
    fn name(&self) -> &'static str {
        "gap"
    }

    fn score(&self, quote: &Quote, _relative_volume: Option<f64>) -> f64 {
        finite_or_zero(quote.change_percent)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Named built-in strategies, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringPolicy {
    #[default]
    Momentum,
    Gap,
}

impl ScoringPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Momentum => "momentum",
            Self::Gap => "gap",
        }
    }

    pub fn strategy(self) -> Arc<dyn ScoreStrategy> {
        match self {
            Self::Momentum => Arc::new(MomentumScore),
            Self::Gap => Arc::new(GapScore),
        }
    }
}

impl Display for ScoringPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringPolicy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "momentum" => Ok(Self::Momentum),
            "gap" => Ok(Self::Gap),
            other => Err(ValidationError::InvalidScoring {
                value: other.to_owned(),
            }),
        }
    }
}

/// Symbol left out of ranking because no usable quote was available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: Symbol,
    pub reason: String,
}

/// Outcome of one scan pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Ranked best first, at most `top_n` long.
    pub candidates: Vec<ScanCandidate>,
    pub skipped: Vec<SkippedSymbol>,
    /// Symbols with a quote that failed a filter.
    pub filtered: usize,
    /// Symbols whose evaluation completed before the deadline.
    pub evaluated: usize,
    pub timed_out: bool,
}

enum Evaluation {
    Candidate(ScanCandidate),
    Filtered(&'static str),
    Skipped(SkippedSymbol),
}

/// Resolves, filters and ranks a universe through a shared reconciler.
pub struct UniverseScanner {
    reconciler: Arc<QuoteReconciler>,
    strategy: Arc<dyn ScoreStrategy>,
    concurrency: usize,
    deadline: Option<Duration>,
    cache_mode: CacheMode,
}

impl UniverseScanner {
    pub fn new(reconciler: Arc<QuoteReconciler>) -> Self {
        Self {
            reconciler,
            strategy: Arc::new(MomentumScore),
            concurrency: 4,
            deadline: None,
            cache_mode: CacheMode::Use,
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ScoreStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Symbols resolved at once; `1` scans sequentially.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop waiting for outstanding symbols after `deadline` and rank what
    /// has completed.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub async fn scan(&self, request: &ScanRequest) -> ScanReport {
        let filters = request.filters();
        let deadline = self
            .deadline
            .map(|limit| tokio::time::Instant::now() + limit);

        let mut evaluations = pin!(stream::iter(request.symbols().iter().enumerate())
            .map(|(index, symbol)| async move { (index, self.evaluate(symbol, filters).await) })
            .buffered(self.concurrency));

        let mut ranked: Vec<(usize, ScanCandidate)> = Vec::new();
        let mut skipped = Vec::new();
        let mut filtered = 0;
        let mut evaluated = 0;
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, evaluations.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => evaluations.next().await,
            };
            let Some((index, evaluation)) = next else {
                break;
            };

            evaluated += 1;
            match evaluation {
                Evaluation::Candidate(candidate) => ranked.push((index, candidate)),
                Evaluation::Filtered(stage) => {
                    debug!(symbol = %request.symbols()[index], stage, "filtered out");
                    filtered += 1;
                }
                Evaluation::Skipped(entry) => skipped.push(entry),
            }
        }

        if timed_out {
            warn!(
                evaluated,
                total = request.symbols().len(),
                "scan deadline reached; ranking partial results"
            );
        }

        ranked.sort_by(|(left_index, left), (right_index, right)| {
            right
                .score
                .total_cmp(&left.score)
                .then(left_index.cmp(right_index))
        });
        ranked.truncate(request.top_n());

        info!(
            strategy = self.strategy.name(),
            universe = request.symbols().len(),
            candidates = ranked.len(),
            skipped = skipped.len(),
            filtered,
            timed_out,
            "scan complete"
        );

        ScanReport {
            candidates: ranked.into_iter().map(|(_, candidate)| candidate).collect(),
            skipped,
            filtered,
            evaluated,
            timed_out,
        }
    }

    async fn evaluate(&self, symbol: &Symbol, filters: &ScanFilters) -> Evaluation {
        let quote = self.reconciler.resolve(symbol, self.cache_mode).await;
        let Some(price) = quote.price() else {
            return Evaluation::Skipped(SkippedSymbol {
                symbol: symbol.clone(),
                reason: quote
                    .unavailable_reason()
                    .unwrap_or("price unavailable")
                    .to_owned(),
            });
        };

        if price < filters.price_low || price > filters.price_high {
            return Evaluation::Filtered("price_band");
        }
        if quote.volume < filters.min_volume {
            return Evaluation::Filtered("min_volume");
        }

        // A cached quote carries the volume seen at its own instant.
        let snapshot = self.reconciler.session_at(quote.as_of);
        let rvol = relative_volume(quote.volume, quote.average_volume, &snapshot);
        if let Some(minimum) = filters.min_relative_volume {
            let passes = match rvol {
                Some(value) => value >= minimum,
                None => filters.unknown_rvol == UnknownRvolPolicy::Admit,
            };
            if !passes {
                return Evaluation::Filtered("min_relative_volume");
            }
        }

        let mut float_shares = None;
        if let Some(max_float) = filters.max_float {
            match self.reconciler.fetch_float(symbol).await {
                Some(float) if float <= max_float => float_shares = Some(float),
                _ => return Evaluation::Filtered("max_float"),
            }
        }

        let mut headline = None;
        if filters.require_news {
            match self.reconciler.fetch_headline(symbol).await {
                Some(title) => headline = Some(title),
                None => return Evaluation::Filtered("news"),
            }
        }

        let score = self.strategy.score(&quote, rvol);
        Evaluation::Candidate(ScanCandidate {
            quote,
            relative_volume: rvol,
            score,
            float_shares,
            headline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstrumentType, MarketSession, PriceState};
    use time::OffsetDateTime;

    fn quote(change_percent: f64) -> Quote {
        let mut quote = Quote::unavailable(
            Symbol::parse("ABC").expect("valid symbol"),
            "placeholder",
            InstrumentType::Equity,
            MarketSession::Regular,
            OffsetDateTime::UNIX_EPOCH,
            Vec::new(),
        );
        quote.price = PriceState::Available { value: 10.0 };
        quote.change_percent = change_percent;
        quote
    }

    #[test]
    fn momentum_weights_relative_volume() {
        let score = MomentumScore.score(&quote(1.5), Some(2.0));
        assert!((score - 5.5).abs() < 1e-9);
        assert_eq!(MomentumScore.score(&quote(1.5), None), 1.5);
    }

    #[test]
    fn gap_ignores_relative_volume() {
        assert_eq!(GapScore.score(&quote(-3.0), Some(10.0)), -3.0);
    }

    #[test]
    fn momentum_is_monotonic() {
        let base = MomentumScore.score(&quote(1.0), Some(1.0));
        assert!(MomentumScore.score(&quote(1.1), Some(1.0)) >= base);
        assert!(MomentumScore.score(&quote(1.0), Some(1.1)) >= base);
    }

    #[test]
    fn request_rejects_bad_inputs_and_dedups() {
        assert_eq!(
            ScanRequest::from_raw(&["AAPL"], ScanFilters::default(), 0),
            Err(ValidationError::ZeroResultCount)
        );

        let inverted = ScanFilters {
            price_low: 50.0,
            price_high: 5.0,
            ..ScanFilters::default()
        };
        assert!(matches!(
            ScanRequest::from_raw(&["AAPL"], inverted, 3),
            Err(ValidationError::InvertedPriceBand { .. })
        ));

        let request = ScanRequest::from_raw(&["aapl", "$AAPL", "msft", "AAPL"], ScanFilters::default(), 3)
            .expect("valid request");
        let symbols: Vec<&str> = request.symbols().iter().map(Symbol::as_str).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn scoring_policy_parses_names() {
        assert_eq!("Momentum".parse::<ScoringPolicy>(), Ok(ScoringPolicy::Momentum));
        assert_eq!("gap".parse::<ScoringPolicy>(), Ok(ScoringPolicy::Gap));
        assert!("random".parse::<ScoringPolicy>().is_err());
        assert_eq!(ScoringPolicy::Gap.strategy().name(), "gap");
    }
}
