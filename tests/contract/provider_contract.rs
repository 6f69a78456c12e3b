//! Contract tests every provider adapter must satisfy.
//!
//! Adapters are driven through the public [`QuoteProvider`] trait against a
//! canned HTTP client, so the same expectations hold for Polygon and Yahoo.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use support::{symbol, CannedHttpClient};
use tickscan_core::{
    CallPacer, HttpError, HttpResponse, PolygonAdapter, ProviderErrorKind, ProviderId,
    ProviderTransport, QuoteProvider, RetryConfig, YahooAdapter,
};

const POLYGON_SNAPSHOT: &str = r#"{"status":"OK","ticker":{"ticker":"AAPL",
    "day":{"c":189.1,"v":51234567},"lastTrade":{"p":189.42},"prevDay":{"c":187.0}}}"#;
const YAHOO_CHART: &str = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":189.4,
    "chartPreviousClose":187.0,"regularMarketVolume":51000000,"instrumentType":"EQUITY"}}],"error":null}}"#;

fn transport(id: ProviderId, client: &Arc<CannedHttpClient>) -> ProviderTransport {
    ProviderTransport::new(id, client.clone())
        .with_retry(RetryConfig::fixed(Duration::ZERO, 1))
        .with_pacer(CallPacer::unpaced())
}

fn polygon(client: &Arc<CannedHttpClient>) -> PolygonAdapter {
    PolygonAdapter::new(transport(ProviderId::Polygon, client), Some(String::from("pk-contract")))
        .with_base_url("https://polygon.test")
}

fn yahoo(client: &Arc<CannedHttpClient>) -> YahooAdapter {
    YahooAdapter::new(transport(ProviderId::Yahoo, client)).with_base_url("https://yahoo.test")
}

/// Both adapters built over the same canned responses, with their happy payload.
fn adapters(
    responses: impl Fn() -> Vec<Result<HttpResponse, HttpError>>,
) -> Vec<(Box<dyn QuoteProvider>, Arc<CannedHttpClient>)> {
    let polygon_client = CannedHttpClient::new(responses());
    let yahoo_client = CannedHttpClient::new(responses());
    vec![
        (Box::new(polygon(&polygon_client)) as Box<dyn QuoteProvider>, polygon_client),
        (Box::new(yahoo(&yahoo_client)) as Box<dyn QuoteProvider>, yahoo_client),
    ]
}

fn happy_body(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Polygon => POLYGON_SNAPSHOT,
        ProviderId::Yahoo => YAHOO_CHART,
    }
}

// =============================================================================
// Contract: Identity and Success
// =============================================================================

#[tokio::test]
async fn every_adapter_returns_a_normalized_partial_quote() {
    for id in ProviderId::ALL {
        let client = CannedHttpClient::new(vec![Ok(HttpResponse::ok(happy_body(id)))]);
        let provider: Box<dyn QuoteProvider> = match id {
            ProviderId::Polygon => Box::new(polygon(&client)),
            ProviderId::Yahoo => Box::new(yahoo(&client)),
        };

        let quote = provider.fetch_quote(&symbol("aapl")).await.expect("quote");

        assert_eq!(provider.id(), id);
        assert_eq!(quote.provider, id);
        assert_eq!(quote.symbol.as_str(), "AAPL");
        assert!(quote.price > 0.0);
        assert_eq!(quote.prior_close, Some(187.0));
        assert!(quote.volume.is_some());
    }
}

// =============================================================================
// Contract: Failure Classification
// =============================================================================

#[tokio::test]
async fn transient_failures_are_retried_within_the_bound() {
    for id in ProviderId::ALL {
        // One 503, then success
        let client = CannedHttpClient::new(vec![
            Ok(HttpResponse::new(503, "upstream down")),
            Ok(HttpResponse::ok(happy_body(id))),
        ]);
        let provider: Box<dyn QuoteProvider> = match id {
            ProviderId::Polygon => Box::new(polygon(&client)),
            ProviderId::Yahoo => Box::new(yahoo(&client)),
        };

        provider
            .fetch_quote(&symbol("AAPL"))
            .await
            .expect("second attempt succeeds");
        assert_eq!(client.requests().len(), 2, "{id} retried once");
    }
}

#[tokio::test]
async fn rate_limits_surface_as_rate_limited_after_the_last_attempt() {
    let responses = || {
        (0..3)
            .map(|_| Ok(HttpResponse::new(429, "slow down")))
            .collect()
    };
    for (provider, client) in adapters(responses) {
        let error = provider.fetch_quote(&symbol("AAPL")).await.expect_err("throttled");
        assert_eq!(error.kind(), ProviderErrorKind::RateLimited);
        // max_retries = 1: two attempts in total
        assert_eq!(client.requests().len(), 2);
    }
}

#[tokio::test]
async fn timeouts_are_classified_as_timeout() {
    let responses = || {
        vec![
            Err(HttpError::Timeout(String::from("deadline"))),
            Err(HttpError::Timeout(String::from("deadline"))),
        ]
    };
    for (provider, _) in adapters(responses) {
        let error = provider.fetch_quote(&symbol("AAPL")).await.expect_err("timed out");
        assert_eq!(error.kind(), ProviderErrorKind::Timeout);
        assert!(error.retryable());
    }
}

#[tokio::test]
async fn unknown_symbols_are_not_found_and_not_retried() {
    let responses = || vec![Ok(HttpResponse::new(404, "{}"))];
    for (provider, client) in adapters(responses) {
        let error = provider.fetch_quote(&symbol("ZZZZ")).await.expect_err("unknown");
        assert_eq!(error.kind(), ProviderErrorKind::NotFound);
        assert_eq!(client.requests().len(), 1);
    }
}

#[tokio::test]
async fn garbage_payloads_are_malformed_never_a_panic() {
    let responses = || vec![Ok(HttpResponse::ok("<html>maintenance</html>"))];
    for (provider, client) in adapters(responses) {
        let error = provider.fetch_quote(&symbol("AAPL")).await.expect_err("garbage");
        assert_eq!(error.kind(), ProviderErrorKind::MalformedResponse);
        assert_eq!(client.requests().len(), 1);
    }
}

#[tokio::test]
async fn zero_prices_are_rejected() {
    let client = CannedHttpClient::new(vec![Ok(HttpResponse::ok(
        r#"{"chart":{"result":[{"meta":{"regularMarketPrice":0.0}}]}}"#,
    ))]);
    let error = yahoo(&client)
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("zero price");
    assert!(!error.retryable());
}

// =============================================================================
// Contract: Configuration and Coverage
// =============================================================================

#[tokio::test]
async fn polygon_without_a_key_is_not_configured_and_makes_no_call() {
    let client = CannedHttpClient::new(vec![Ok(HttpResponse::ok(POLYGON_SNAPSHOT))]);
    let adapter = PolygonAdapter::new(transport(ProviderId::Polygon, &client), None);

    let error = adapter.fetch_quote(&symbol("AAPL")).await.expect_err("no key");

    assert!(!adapter.is_configured());
    assert_eq!(error.kind(), ProviderErrorKind::NotConfigured);
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn polygon_declines_currency_pairs_and_yahoo_serves_them() {
    let client = CannedHttpClient::new(Vec::new());
    let pair = symbol("eth/usd");

    assert!(!polygon(&client).supports(&pair));
    assert!(yahoo(&client).supports(&pair));
    let error = polygon(&client).fetch_quote(&pair).await.expect_err("unsupported");
    assert_eq!(error.kind(), ProviderErrorKind::Unsupported);
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn optional_calls_report_unsupported_rather_than_guessing() {
    let client = CannedHttpClient::new(Vec::new());

    let float = yahoo(&client).fetch_float(&symbol("AAPL")).await.expect_err("no float");
    let average = polygon(&client)
        .fetch_average_volume(&symbol("AAPL"))
        .await
        .expect_err("no average volume");

    assert_eq!(float.kind(), ProviderErrorKind::Unsupported);
    assert_eq!(average.kind(), ProviderErrorKind::Unsupported);
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn yahoo_average_volume_leaves_out_the_session_in_progress() {
    let client = CannedHttpClient::new(vec![Ok(HttpResponse::ok(
        r#"{"chart":{"result":[{"meta":{"regularMarketPrice":10.0},
            "indicators":{"quote":[{"volume":[1000000,null,3000000,200]}]}}]}}"#,
    ))]);

    let average = yahoo(&client)
        .fetch_average_volume(&symbol("AAPL"))
        .await
        .expect("average volume");

    assert_eq!(average, 2_000_000);
    assert!(client.requests()[0].url.contains("range=3mo"));
}

#[tokio::test]
async fn headlines_come_back_trimmed_or_absent() {
    let polygon_client = CannedHttpClient::new(vec![Ok(HttpResponse::ok(
        r#"{"results":[{"title":"  Apple unveils new chip  "}]}"#,
    ))]);
    let yahoo_client = CannedHttpClient::new(vec![Ok(HttpResponse::ok(r#"{"news":[]}"#))]);

    let polygon_headline = polygon(&polygon_client)
        .fetch_news_headline(&symbol("AAPL"))
        .await
        .expect("news call");
    let yahoo_headline = yahoo(&yahoo_client)
        .fetch_news_headline(&symbol("AAPL"))
        .await
        .expect("news call");

    assert_eq!(polygon_headline.as_deref(), Some("Apple unveils new chip"));
    assert_eq!(yahoo_headline, None);
}
