use serde::Deserialize;
use tracing::debug;

use crate::adapters::volume_from_f64;
use crate::http_client::HttpRequest;
use crate::provider::{ProviderFuture, QuoteProvider};
use crate::transport::ProviderTransport;
use crate::{InstrumentType, PartialQuote, ProviderError, ProviderId, Symbol};

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo Finance chart/search adapter. Keyless, serves equities, ETFs,
/// indices and currency pairs. Float is not available from these endpoints.
#[derive(Clone)]
pub struct YahooAdapter {
    transport: ProviderTransport,
    base_url: String,
}

impl YahooAdapter {
    pub fn new(transport: ProviderTransport) -> Self {
        Self {
            transport,
            base_url: YAHOO_BASE_URL.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn chart(
        &self,
        symbol: &Symbol,
        range: &str,
        call: &'static str,
    ) -> Result<ChartResult, ProviderError> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={range}&interval=1d",
            self.base_url,
            urlencoding::encode(symbol.as_str())
        );
        let payload: ChartResponse = self.transport.get_json(HttpRequest::get(url), call).await?;

        if let Some(error) = payload.chart.error {
            let description = error.description.unwrap_or_default();
            return Err(match error.code.as_deref() {
                Some("Not Found") => ProviderError::not_found(format!("yahoo: {description}")),
                _ => ProviderError::malformed(format!("yahoo chart error: {description}")),
            });
        }

        payload
            .chart
            .result
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| ProviderError::not_found(format!("yahoo returned no chart for {symbol}")))
    }

    async fn quote(&self, symbol: &Symbol) -> Result<PartialQuote, ProviderError> {
        let chart = self.chart(symbol, "1d", "quote").await?;
        let meta = chart.meta;
        let price = meta.regular_market_price.unwrap_or(0.0);

        debug!(provider = "yahoo", symbol = %symbol, price, "chart decoded");

        Ok(PartialQuote::new(ProviderId::Yahoo, symbol.clone(), price)?
            .with_prior_close(meta.previous_close.or(meta.chart_previous_close))
            .with_volume(volume_from_f64(meta.regular_market_volume))
            .with_instrument_type(meta.instrument_type.as_deref().map(instrument_type)))
    }

    async fn prior_close(&self, symbol: &Symbol) -> Result<f64, ProviderError> {
        let meta = self.chart(symbol, "1d", "prior close").await?.meta;
        meta.previous_close
            .or(meta.chart_previous_close)
            .filter(|close| close.is_finite() && *close > 0.0)
            .ok_or_else(|| ProviderError::not_found(format!("yahoo has no prior close for {symbol}")))
    }

    async fn average_volume(&self, symbol: &Symbol) -> Result<u64, ProviderError> {
        let chart = self.chart(symbol, "3mo", "average volume").await?;
        let volumes = chart
            .indicators
            .and_then(|indicators| indicators.quote.into_iter().next())
            .map(|quote| quote.volume)
            .unwrap_or_default();

        average_daily_volume(&volumes)
            .ok_or_else(|| ProviderError::not_found(format!("yahoo has no volume history for {symbol}")))
    }

    async fn headline(&self, symbol: &Symbol) -> Result<Option<String>, ProviderError> {
        let url = format!(
            "{}/v1/finance/search?q={}&newsCount=1&quotesCount=0",
            self.base_url,
            urlencoding::encode(symbol.as_str())
        );
        let payload: SearchResponse = self.transport.get_json(HttpRequest::get(url), "news").await?;

        Ok(payload
            .news
            .into_iter()
            .filter_map(|item| item.title)
            .map(|title| title.trim().to_owned())
            .find(|title| !title.is_empty()))
    }
}

impl QuoteProvider for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, PartialQuote> {
        Box::pin(self.quote(symbol))
    }

    fn fetch_prior_close<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, f64> {
        Box::pin(self.prior_close(symbol))
    }

    fn fetch_average_volume<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, u64> {
        Box::pin(self.average_volume(symbol))
    }

    fn fetch_news_headline<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<String>> {
        Box::pin(self.headline(symbol))
    }
}

fn instrument_type(raw: &str) -> InstrumentType {
    match raw {
        "EQUITY" => InstrumentType::Equity,
        "ETF" | "MUTUALFUND" => InstrumentType::Etf,
        "CRYPTOCURRENCY" | "CURRENCY" => InstrumentType::Crypto,
        "INDEX" => InstrumentType::Index,
        _ => InstrumentType::Other,
    }
}

/// Mean of the completed daily bars. The last bar is the session in
/// progress and is left out when there is more than one.
fn average_daily_volume(volumes: &[Option<f64>]) -> Option<u64> {
    let completed = match volumes.len() {
        0 | 1 => volumes,
        len => &volumes[..len - 1],
    };
    let known: Vec<u64> = completed
        .iter()
        .filter_map(|volume| volume_from_f64(*volume))
        .filter(|volume| *volume > 0)
        .collect();

    if known.is_empty() {
        return None;
    }
    Some(known.iter().sum::<u64>() / known.len() as u64)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<f64>,
    #[serde(rename = "previousClose", default)]
    previous_close: Option<f64>,
    #[serde(rename = "chartPreviousClose", default)]
    chart_previous_close: Option<f64>,
    #[serde(rename = "regularMarketVolume", default)]
    regular_market_volume: Option<f64>,
    #[serde(rename = "instrumentType", default)]
    instrument_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
struct SearchNews {
    #[serde(default)]
    title: Option<String>,
}
