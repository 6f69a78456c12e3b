use serde::Deserialize;
use tracing::debug;

use crate::adapters::volume_from_f64;
use crate::http_client::{ApiKey, HttpRequest};
use crate::provider::{ProviderFuture, QuoteProvider};
use crate::transport::ProviderTransport;
use crate::{PartialQuote, ProviderError, ProviderId, Symbol};

pub const POLYGON_BASE_URL: &str = "https://api.polygon.io";

/// Polygon.io adapter. Keyed; serves US equities and ETFs.
///
/// Without an API key every call fails with `NotConfigured`, which the
/// reconciler folds like any other provider failure.
#[derive(Clone)]
pub struct PolygonAdapter {
    transport: ProviderTransport,
    api_key: Option<ApiKey>,
    base_url: String,
}

impl PolygonAdapter {
    pub fn new(transport: ProviderTransport, api_key: Option<String>) -> Self {
        Self {
            transport,
            api_key: api_key.and_then(ApiKey::new),
            base_url: POLYGON_BASE_URL.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request(&self, path_and_query: &str) -> Result<HttpRequest, ProviderError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::not_configured(ProviderId::Polygon))?;
        Ok(HttpRequest::get(format!("{}{path_and_query}", self.base_url)).with_bearer(key))
    }

    fn guard(&self, symbol: &Symbol) -> Result<(), ProviderError> {
        if self.supports(symbol) {
            Ok(())
        } else {
            Err(ProviderError::unsupported(ProviderId::Polygon, "currency pairs"))
        }
    }

    async fn snapshot(&self, symbol: &Symbol) -> Result<PartialQuote, ProviderError> {
        self.guard(symbol)?;
        let request = self.request(&format!(
            "/v2/snapshot/locale/us/markets/stocks/tickers/{}",
            polygon_ticker(symbol)
        ))?;
        let payload: SnapshotResponse = self.transport.get_json(request, "snapshot").await?;

        let ticker = payload
            .ticker
            .ok_or_else(|| ProviderError::not_found(format!("polygon has no snapshot for {symbol}")))?;

        let day = ticker.day.unwrap_or_default();
        let price = [
            ticker.last_trade.and_then(|trade| trade.p),
            day.c,
            ticker.min.and_then(|bar| bar.c),
        ]
        .into_iter()
        .flatten()
        .find(|price| price.is_finite() && *price > 0.0)
        .unwrap_or(0.0);

        debug!(provider = "polygon", symbol = %symbol, price, "snapshot decoded");

        Ok(PartialQuote::new(ProviderId::Polygon, symbol.clone(), price)?
            .with_prior_close(ticker.prev_day.and_then(|bar| bar.c))
            .with_volume(volume_from_f64(day.v)))
    }

    async fn previous_close(&self, symbol: &Symbol) -> Result<f64, ProviderError> {
        self.guard(symbol)?;
        let request = self.request(&format!(
            "/v2/aggs/ticker/{}/prev?adjusted=true",
            polygon_ticker(symbol)
        ))?;
        let payload: AggregatesResponse = self.transport.get_json(request, "prior close").await?;

        payload
            .results
            .into_iter()
            .next()
            .and_then(|bar| bar.c)
            .filter(|close| close.is_finite() && *close > 0.0)
            .ok_or_else(|| ProviderError::not_found(format!("polygon has no prior close for {symbol}")))
    }

    async fn shares_outstanding(&self, symbol: &Symbol) -> Result<u64, ProviderError> {
        self.guard(symbol)?;
        let request = self.request(&format!("/v3/reference/tickers/{}", polygon_ticker(symbol)))?;
        let payload: TickerDetailsResponse = self.transport.get_json(request, "float").await?;

        let details = payload.results.unwrap_or_default();
        volume_from_f64(
            details
                .share_class_shares_outstanding
                .or(details.weighted_shares_outstanding),
        )
        .filter(|shares| *shares > 0)
        .ok_or_else(|| ProviderError::not_found(format!("polygon has no share count for {symbol}")))
    }

    async fn latest_headline(&self, symbol: &Symbol) -> Result<Option<String>, ProviderError> {
        self.guard(symbol)?;
        let request = self.request(&format!(
            "/v2/reference/news?ticker={}&limit=1&order=desc&sort=published_utc",
            polygon_ticker(symbol)
        ))?;
        let payload: NewsResponse = self.transport.get_json(request, "news").await?;

        Ok(payload
            .results
            .into_iter()
            .filter_map(|article| article.title)
            .map(|title| title.trim().to_owned())
            .find(|title| !title.is_empty()))
    }
}

impl QuoteProvider for PolygonAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Polygon
    }

    fn supports(&self, symbol: &Symbol) -> bool {
        !symbol.is_currency_pair()
    }

    fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, PartialQuote> {
        Box::pin(self.snapshot(symbol))
    }

    fn fetch_prior_close<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, f64> {
        Box::pin(self.previous_close(symbol))
    }

    fn fetch_news_headline<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<String>> {
        Box::pin(self.latest_headline(symbol))
    }

    fn fetch_float<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, u64> {
        Box::pin(self.shares_outstanding(symbol))
    }
}

/// Polygon writes class shares with a dot (`BRK.B`).
fn polygon_ticker(symbol: &Symbol) -> String {
    urlencoding::encode(&symbol.as_str().replace('-', ".")).into_owned()
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    #[serde(default)]
    ticker: Option<SnapshotTicker>,
}

#[derive(Debug, Deserialize)]
struct SnapshotTicker {
    #[serde(default)]
    day: Option<SnapshotBar>,
    #[serde(rename = "lastTrade", default)]
    last_trade: Option<SnapshotTrade>,
    #[serde(default)]
    min: Option<SnapshotBar>,
    #[serde(rename = "prevDay", default)]
    prev_day: Option<SnapshotBar>,
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotBar {
    #[serde(default)]
    c: Option<f64>,
    #[serde(default)]
    v: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SnapshotTrade {
    #[serde(default)]
    p: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Vec<SnapshotBar>,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    #[serde(default)]
    results: Option<TickerDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct TickerDetails {
    #[serde(default)]
    share_class_shares_outstanding: Option<f64>,
    #[serde(default)]
    weighted_shares_outstanding: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    #[serde(default)]
    title: Option<String>,
}
