//! Short-lived in-memory cache of reconciled quotes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::{Quote, Symbol};

/// Per-call cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a fresh entry if present, otherwise resolve and store.
    #[default]
    Use,
    /// Always resolve, then overwrite the entry.
    Refresh,
    /// Resolve without reading or writing the cache.
    Bypass,
}

impl CacheMode {
    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        matches!(self, Self::Use | Self::Refresh)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    quote: Quote,
    expires_at: Instant,
}

/// Symbol-keyed quote cache shared across scans.
///
/// A zero TTL disables the cache entirely. Failure-state quotes are never
/// stored, so an outage is not remembered past the call that saw it.
#[derive(Debug, Clone)]
pub struct QuoteCache {
    entries: Arc<RwLock<HashMap<Symbol, Entry>>>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_disabled(&self) -> bool {
        self.ttl.is_zero()
    }

    pub async fn get(&self, symbol: &Symbol) -> Option<Quote> {
        if self.is_disabled() {
            return None;
        }
        let entries = self.entries.read().await;
        entries
            .get(symbol)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.quote.clone())
    }

    pub async fn put(&self, quote: &Quote) {
        if self.is_disabled() || !quote.is_available() {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.insert(
            quote.symbol.clone(),
            Entry {
                quote: quote.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub async fn clear_expired(&self) {
        let now = Instant::now();
        self.entries.write().await.retain(|_, entry| entry.expires_at > now);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::disabled()
    }
}
