//! Shared fakes for the behavior and contract suites.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickscan_core::{
    Clock, FixedClock, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, PartialQuote, ProviderError,
    ProviderFuture, ProviderId, QuoteProvider, QuoteReconciler, Symbol,
};
use time::macros::datetime;
use time::OffsetDateTime;

/// Wednesday 2024-01-10 10:15 New York time, 45 minutes into the regular session.
pub const REGULAR_SESSION_INSTANT: OffsetDateTime = datetime!(2024-01-10 15:15 UTC);

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

/// What a [`FakeProvider`] knows about one symbol.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub price: f64,
    pub prior_close: Option<f64>,
    pub volume: Option<u64>,
    pub average_volume: Option<u64>,
    pub float_shares: Option<u64>,
    pub headline: Option<String>,
    pub delay: Duration,
}

impl Listing {
    pub fn priced(price: f64) -> Self {
        Self {
            price,
            ..Self::default()
        }
    }

    pub fn with_prior_close(mut self, prior_close: f64) -> Self {
        self.prior_close = Some(prior_close);
        self
    }

    pub fn with_volume(mut self, volume: u64, average_volume: Option<u64>) -> Self {
        self.volume = Some(volume);
        self.average_volume = average_volume;
        self
    }

    pub fn with_float(mut self, float_shares: u64) -> Self {
        self.float_shares = Some(float_shares);
        self
    }

    pub fn with_headline(mut self, headline: &str) -> Self {
        self.headline = Some(headline.to_owned());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// In-memory provider keyed by canonical symbol.
///
/// Symbols without a listing fail with `not_found`; symbols given an
/// explicit error fail with it.
pub struct FakeProvider {
    id: ProviderId,
    listings: HashMap<String, Listing>,
    failures: HashMap<String, ProviderError>,
    serves_pairs: bool,
    quote_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            listings: HashMap::new(),
            failures: HashMap::new(),
            serves_pairs: true,
            quote_calls: AtomicUsize::new(0),
        }
    }

    pub fn listing(mut self, raw: &str, listing: Listing) -> Self {
        self.listings.insert(symbol(raw).as_str().to_owned(), listing);
        self
    }

    pub fn failing(mut self, raw: &str, error: ProviderError) -> Self {
        self.failures.insert(symbol(raw).as_str().to_owned(), error);
        self
    }

    pub fn equities_only(mut self) -> Self {
        self.serves_pairs = false;
        self
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, symbol: &Symbol) -> Result<Listing, ProviderError> {
        if let Some(error) = self.failures.get(symbol.as_str()) {
            return Err(error.clone());
        }
        self.listings
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("{} does not list {symbol}", self.id)))
    }
}

impl QuoteProvider for FakeProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn supports(&self, symbol: &Symbol) -> bool {
        self.serves_pairs || !symbol.is_currency_pair()
    }

    fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, PartialQuote> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let listing = self.lookup(symbol)?;
            if !listing.delay.is_zero() {
                tokio::time::sleep(listing.delay).await;
            }
            Ok(PartialQuote::new(self.id, symbol.clone(), listing.price)?
                .with_prior_close(listing.prior_close)
                .with_volume(listing.volume)
                .with_average_volume(listing.average_volume))
        })
    }

    fn fetch_float<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, u64> {
        Box::pin(async move {
            self.lookup(symbol)?
                .float_shares
                .ok_or_else(|| ProviderError::unsupported(self.id, "float"))
        })
    }

    fn fetch_news_headline<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.lookup(symbol)?.headline) })
    }
}

/// Reconciler over the given fakes, pinned to a regular-session instant.
pub fn reconciler(providers: Vec<Arc<FakeProvider>>) -> QuoteReconciler {
    QuoteReconciler::builder()
        .providers(
            providers
                .into_iter()
                .map(|provider| provider as Arc<dyn QuoteProvider>)
                .collect(),
        )
        .clock(Arc::new(FixedClock(REGULAR_SESSION_INSTANT)))
        .build()
}

/// Clock the test moves by hand.
pub struct SteppingClock(Mutex<OffsetDateTime>);

impl SteppingClock {
    pub fn starting_at(at: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self(Mutex::new(at)))
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.0.lock().expect("clock") = at;
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock().expect("clock")
    }
}

/// HTTP client answering from a queue of canned results.
#[derive(Default)]
pub struct CannedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedHttpClient {
    pub fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("request log").clone()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.requests.lock().expect("request log").push(request);
        let next = self
            .responses
            .lock()
            .expect("response queue")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Request(String::from("no canned response left"))));
        Box::pin(async move { next })
    }
}
