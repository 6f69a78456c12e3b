//! Upstream quote adapters.
//!
//! | Adapter | Key | Quote | Prior close | Avg volume | News | Float |
//! |---------|-----|-------|-------------|------------|------|-------|
//! | [`PolygonAdapter`] | required | snapshot | `/prev` aggregate | - | yes | shares outstanding |
//! | [`YahooAdapter`] | none | chart meta | chart meta | 3-month chart | search | - |
//!
//! Both adapters send every call through a [`ProviderTransport`](crate::transport::ProviderTransport),
//! which owns pacing, timeouts, retries and the circuit breaker.

mod polygon;
mod yahoo;

pub use polygon::{PolygonAdapter, POLYGON_BASE_URL};
pub use yahoo::{YahooAdapter, YAHOO_BASE_URL};

/// Upstreams report volumes as JSON numbers that may carry a fraction.
pub(crate) fn volume_from_f64(value: Option<f64>) -> Option<u64> {
    value
        .filter(|volume| volume.is_finite() && *volume >= 0.0)
        .map(|volume| volume.round() as u64)
}
