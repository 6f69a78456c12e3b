//! Quote reconciliation across providers.
//!
//! Providers are folded left to right in priority order. The first positive
//! price wins; the next success becomes the secondary used for the
//! discrepancy check and shown as the alternate quote. Auxiliary fields are
//! merged from the winner first, then the other successes, and any reference
//! value still missing is filled by the providers' optional calls.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::adapters::{PolygonAdapter, YahooAdapter};
use crate::cache::{CacheMode, QuoteCache};
use crate::config::TickscanConfig;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider::QuoteProvider;
use crate::session::{classify, Clock, ExchangeTimezone, SessionSnapshot, SystemClock};
use crate::throttling::CallPacer;
use crate::transport::ProviderTransport;
use crate::{
    change_percent, AlternateQuote, AttemptOutcome, InstrumentType, PartialQuote, PriceState,
    ProviderErrorKind, ProviderId, Quote, SourceAttempt, Symbol, ValidationError,
};

/// Default discrepancy tolerance: 50 basis points.
pub const DEFAULT_TOLERANCE_BPS: u32 = 50;

/// Merges provider results into one authoritative [`Quote`].
pub struct QuoteReconciler {
    providers: Vec<Arc<dyn QuoteProvider>>,
    tolerance_bps: u32,
    timezone: ExchangeTimezone,
    clock: Arc<dyn Clock>,
    cache: QuoteCache,
}

impl QuoteReconciler {
    pub fn builder() -> QuoteReconcilerBuilder {
        QuoteReconcilerBuilder::default()
    }

    /// Production reconciler: real HTTP adapters in the configured order.
    pub fn from_config(config: &TickscanConfig) -> Self {
        Self::from_config_with_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    /// Same as [`from_config`](Self::from_config) over an injected client.
    pub fn from_config_with_client(config: &TickscanConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let transport = |provider: ProviderId| {
            ProviderTransport::new(provider, Arc::clone(&http_client))
                .with_retry(config.retry_config())
                .with_pacer(CallPacer::new(config.min_call_gap))
        };

        let providers = config
            .provider_order
            .iter()
            .map(|provider| -> Arc<dyn QuoteProvider> {
                match provider {
                    ProviderId::Polygon => Arc::new(PolygonAdapter::new(
                        transport(ProviderId::Polygon),
                        config.polygon_api_key.clone(),
                    )),
                    ProviderId::Yahoo => Arc::new(YahooAdapter::new(transport(ProviderId::Yahoo))),
                }
            })
            .collect();

        if config.polygon_api_key.is_none() && config.provider_order.contains(&ProviderId::Polygon) {
            info!("polygon api key not set; polygon will report not_configured");
        }

        Self::builder()
            .providers(providers)
            .tolerance_bps(config.tolerance_bps)
            .timezone(config.timezone)
            .cache(QuoteCache::new(config.cache_ttl))
            .build()
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|provider| provider.id()).collect()
    }

    pub fn tolerance_bps(&self) -> u32 {
        self.tolerance_bps
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    /// Session at the reconciler's clock.
    pub fn session(&self) -> SessionSnapshot {
        self.session_at(self.clock.now())
    }

    /// Session at `at` in the reconciler's exchange timezone.
    pub fn session_at(&self, at: OffsetDateTime) -> SessionSnapshot {
        classify(at, self.timezone)
    }

    pub fn timezone(&self) -> ExchangeTimezone {
        self.timezone
    }

    /// Validates `raw` and resolves it.
    ///
    /// # Errors
    ///
    /// Only input validation fails; provider failures produce an
    /// unavailable [`Quote`].
    pub async fn resolve_raw(&self, raw: &str) -> Result<Quote, ValidationError> {
        let symbol = Symbol::parse(raw)?;
        Ok(self.resolve(&symbol, CacheMode::Use).await)
    }

    /// Resolves a validated symbol into exactly one quote.
    pub async fn resolve(&self, symbol: &Symbol, mode: CacheMode) -> Quote {
        if mode.reads() {
            if let Some(cached) = self.cache.get(symbol).await {
                debug!(symbol = %symbol, "quote served from cache");
                return cached;
            }
        }

        let snapshot = self.session();
        let (successes, attempts) = self.fold_providers(symbol).await;

        let quote = match successes.split_first() {
            None => {
                let reason = failure_reason(&attempts);
                warn!(symbol = %symbol, reason = %reason, "no provider returned a price");
                Quote::unavailable(
                    symbol.clone(),
                    reason,
                    default_instrument_type(symbol),
                    snapshot.session,
                    self.clock.now(),
                    attempts,
                )
            }
            Some((primary, rest)) => self.merge(symbol, primary, rest, snapshot, attempts).await,
        };

        if mode.writes() {
            self.cache.put(&quote).await;
        }
        quote
    }

    /// Queries providers in order until a winner and one secondary succeed.
    async fn fold_providers(&self, symbol: &Symbol) -> (Vec<PartialQuote>, Vec<SourceAttempt>) {
        let mut successes = Vec::with_capacity(2);
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            if successes.len() >= 2 {
                break;
            }

            let id = provider.id();
            if !provider.supports(symbol) {
                debug!(provider = %id, symbol = %symbol, "provider does not serve symbol");
                attempts.push(SourceAttempt::skipped(id, "symbol not supported"));
                continue;
            }

            match provider.fetch_quote(symbol).await {
                Ok(partial) => {
                    debug!(provider = %id, symbol = %symbol, price = partial.price, "provider succeeded");
                    attempts.push(SourceAttempt::succeeded(id));
                    successes.push(partial);
                }
                Err(error) => {
                    if error.kind() == ProviderErrorKind::NotConfigured {
                        debug!(provider = %id, symbol = %symbol, "provider not configured");
                    } else {
                        warn!(provider = %id, symbol = %symbol, error = %error, "provider failed");
                    }
                    attempts.push(SourceAttempt::failed(id, &error));
                }
            }
        }

        (successes, attempts)
    }

    async fn merge(
        &self,
        symbol: &Symbol,
        primary: &PartialQuote,
        rest: &[PartialQuote],
        snapshot: SessionSnapshot,
        attempts: Vec<SourceAttempt>,
    ) -> Quote {
        let secondary = rest.first();
        let ordered = || std::iter::once(primary).chain(rest.iter());

        let discrepancy_note = secondary.and_then(|secondary| {
            let note = discrepancy(primary, secondary, self.tolerance_bps);
            if let Some(note) = &note {
                info!(symbol = %symbol, note = %note, "provider prices disagree");
            }
            note
        });
        let alternate_quote = secondary.map(|secondary| AlternateQuote {
            source: secondary.provider,
            price: secondary.price,
        });

        let mut prior_close = ordered().find_map(|partial| partial.prior_close);
        if prior_close.is_none() {
            prior_close = self.fill_prior_close(symbol).await;
        }
        let mut average_volume = ordered().find_map(|partial| partial.average_volume);
        if average_volume.is_none() {
            average_volume = self.fill_average_volume(symbol).await;
        }
        let volume = ordered().find_map(|partial| partial.volume).unwrap_or(0);
        let instrument_type = ordered()
            .find_map(|partial| partial.instrument_type)
            .unwrap_or_else(|| default_instrument_type(symbol));

        Quote {
            symbol: symbol.clone(),
            price: PriceState::Available {
                value: primary.price,
            },
            change_percent: change_percent(primary.price, prior_close),
            prior_close,
            instrument_type,
            session: snapshot.session,
            volume,
            average_volume,
            source_used: Some(primary.provider),
            discrepancy_note,
            alternate_quote,
            as_of: self.clock.now(),
            attempts,
        }
    }

    async fn fill_prior_close(&self, symbol: &Symbol) -> Option<f64> {
        for provider in self.supporting(symbol) {
            match provider.fetch_prior_close(symbol).await {
                Ok(close) if close.is_finite() && close > 0.0 => return Some(close),
                Ok(_) => {}
                Err(error) => debug!(provider = %provider.id(), symbol = %symbol, error = %error, "prior close unavailable"),
            }
        }
        None
    }

    async fn fill_average_volume(&self, symbol: &Symbol) -> Option<u64> {
        for provider in self.supporting(symbol) {
            match provider.fetch_average_volume(symbol).await {
                Ok(average) if average > 0 => return Some(average),
                Ok(_) => {}
                Err(error) => debug!(provider = %provider.id(), symbol = %symbol, error = %error, "average volume unavailable"),
            }
        }
        None
    }

    /// Float (or shares-outstanding proxy) from the first provider that has it.
    pub async fn fetch_float(&self, symbol: &Symbol) -> Option<u64> {
        for provider in self.supporting(symbol) {
            match provider.fetch_float(symbol).await {
                Ok(float) => return Some(float),
                Err(error) => debug!(provider = %provider.id(), symbol = %symbol, error = %error, "float unavailable"),
            }
        }
        None
    }

    /// Most recent headline from the first provider that reports one.
    pub async fn fetch_headline(&self, symbol: &Symbol) -> Option<String> {
        for provider in self.supporting(symbol) {
            match provider.fetch_news_headline(symbol).await {
                Ok(Some(headline)) => return Some(headline),
                Ok(None) => {}
                Err(error) => debug!(provider = %provider.id(), symbol = %symbol, error = %error, "news unavailable"),
            }
        }
        None
    }

    fn supporting<'a>(&'a self, symbol: &'a Symbol) -> impl Iterator<Item = &'a Arc<dyn QuoteProvider>> + 'a {
        self.providers
            .iter()
            .filter(move |provider| provider.supports(symbol))
    }
}

/// Builder for [`QuoteReconciler`].
pub struct QuoteReconcilerBuilder {
    providers: Vec<Arc<dyn QuoteProvider>>,
    tolerance_bps: u32,
    timezone: ExchangeTimezone,
    clock: Arc<dyn Clock>,
    cache: QuoteCache,
}

impl Default for QuoteReconcilerBuilder {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            tolerance_bps: DEFAULT_TOLERANCE_BPS,
            timezone: ExchangeTimezone::UsEastern,
            clock: Arc::new(SystemClock),
            cache: QuoteCache::disabled(),
        }
    }
}

impl QuoteReconcilerBuilder {
    /// Appends a provider at the lowest priority so far.
    pub fn provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Replaces the provider list; order is priority order.
    pub fn providers(mut self, providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn tolerance_bps(mut self, tolerance_bps: u32) -> Self {
        self.tolerance_bps = tolerance_bps;
        self
    }

    pub fn timezone(mut self, timezone: ExchangeTimezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(mut self, cache: QuoteCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn build(self) -> QuoteReconciler {
        QuoteReconciler {
            providers: self.providers,
            tolerance_bps: self.tolerance_bps,
            timezone: self.timezone,
            clock: self.clock,
            cache: self.cache,
        }
    }
}

/// Discrepancy note when `|primary - secondary| / secondary` is strictly
/// above the tolerance.
fn discrepancy(primary: &PartialQuote, secondary: &PartialQuote, tolerance_bps: u32) -> Option<String> {
    if secondary.price <= 0.0 {
        return None;
    }
    let relative = (primary.price - secondary.price).abs() / secondary.price;
    let tolerance = f64::from(tolerance_bps) / 10_000.0;

    (relative > tolerance).then(|| {
        format!(
            "{} {:.4} vs {} {:.4}: {:.2}% apart, tolerance {} bps",
            primary.provider,
            primary.price,
            secondary.provider,
            secondary.price,
            relative * 100.0,
            tolerance_bps
        )
    })
}

fn failure_reason(attempts: &[SourceAttempt]) -> String {
    if attempts.is_empty() {
        return String::from("no providers configured");
    }
    attempts
        .iter()
        .map(|attempt| match &attempt.outcome {
            AttemptOutcome::Failed { message, .. } => format!("{}: {message}", attempt.provider),
            AttemptOutcome::Skipped { reason } => format!("{}: skipped ({reason})", attempt.provider),
            AttemptOutcome::Succeeded => format!("{}: succeeded", attempt.provider),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn default_instrument_type(symbol: &Symbol) -> InstrumentType {
    if symbol.is_currency_pair() {
        InstrumentType::Crypto
    } else {
        InstrumentType::Equity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderFuture;
    use crate::session::FixedClock;
    use crate::{MarketSession, ProviderError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    struct StubProvider {
        id: ProviderId,
        price: Result<f64, ProviderError>,
        prior_close: Option<f64>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn priced(id: ProviderId, price: f64) -> Arc<Self> {
            Arc::new(Self {
                id,
                price: Ok(price),
                prior_close: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(id: ProviderId, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                id,
                price: Err(error),
                prior_close: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl QuoteProvider for StubProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, PartialQuote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.price.clone().and_then(|price| {
                PartialQuote::new(self.id, symbol.clone(), price)
                    .map(|partial| partial.with_prior_close(self.prior_close))
            });
            Box::pin(async move { result })
        }
    }

    fn reconciler(providers: Vec<Arc<dyn QuoteProvider>>) -> QuoteReconciler {
        QuoteReconciler::builder()
            .providers(providers)
            .clock(Arc::new(FixedClock(datetime!(2024-01-10 15:15 UTC))))
            .build()
    }

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("valid symbol")
    }

    #[test]
    fn discrepancy_threshold_is_strict() {
        let primary = PartialQuote::new(ProviderId::Polygon, symbol(), 12.5).expect("price");
        let secondary = PartialQuote::new(ProviderId::Yahoo, symbol(), 10.0).expect("price");
        // exactly 2500 bps apart: not flagged
        assert!(discrepancy(&primary, &secondary, 2_500).is_none());
        assert!(discrepancy(&primary, &secondary, 2_499).is_some());
    }

    #[tokio::test]
    async fn stops_after_winner_and_secondary() {
        let third = StubProvider::priced(ProviderId::Yahoo, 99.0);
        let quote = reconciler(vec![
            StubProvider::priced(ProviderId::Polygon, 10.0),
            StubProvider::priced(ProviderId::Yahoo, 10.01),
            third.clone(),
        ])
        .resolve(&symbol(), CacheMode::Bypass)
        .await;

        assert_eq!(quote.price(), Some(10.0));
        assert_eq!(quote.attempts.len(), 2);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
        assert_eq!(quote.session, MarketSession::Regular);
    }

    #[tokio::test]
    async fn no_providers_yields_unavailable_quote() {
        let quote = reconciler(Vec::new()).resolve(&symbol(), CacheMode::Bypass).await;
        assert_eq!(quote.unavailable_reason(), Some("no providers configured"));
    }

    #[tokio::test]
    async fn failure_reason_names_every_provider() {
        let quote = reconciler(vec![
            StubProvider::failing(ProviderId::Polygon, ProviderError::not_configured(ProviderId::Polygon)),
            StubProvider::failing(ProviderId::Yahoo, ProviderError::timeout("yahoo quote timed out")),
        ])
        .resolve(&symbol(), CacheMode::Bypass)
        .await;

        let reason = quote.unavailable_reason().expect("failure quote");
        assert!(reason.contains("polygon: provider 'polygon' is not configured"), "{reason}");
        assert!(reason.contains("yahoo: yahoo quote timed out"), "{reason}");
        assert_eq!(quote.source_used, None);
    }
}
