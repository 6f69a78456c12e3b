//! Per-adapter call execution: pacing, timeout, bounded retry and circuit
//! breaking around an [`HttpClient`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::retry::RetryConfig;
use crate::throttling::CallPacer;
use crate::{ProviderError, ProviderErrorKind, ProviderId};

/// Everything an adapter needs to talk to its upstream.
#[derive(Clone)]
pub struct ProviderTransport {
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    retry: RetryConfig,
    pacer: CallPacer,
    breaker: Arc<CircuitBreaker>,
}

impl ProviderTransport {
    pub fn new(provider: ProviderId, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            provider,
            http_client,
            retry: RetryConfig::default(),
            pacer: CallPacer::default(),
            breaker: Arc::new(CircuitBreaker::new(provider, CircuitBreakerConfig::default())),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacer(mut self, pacer: CallPacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = Arc::new(CircuitBreaker::new(self.provider, config));
        self
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Executes `request` and decodes the JSON body as `T`.
    ///
    /// Transient failures are retried up to the configured bound; decoding
    /// failures are reported as [`ProviderErrorKind::MalformedResponse`]
    /// and never retried.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        call: &'static str,
    ) -> Result<T, ProviderError> {
        let body = self.get_body(request, call).await?;
        serde_json::from_str(&body).map_err(|error| {
            ProviderError::malformed(format!(
                "{} {call} payload could not be decoded: {error}",
                self.provider
            ))
        })
    }

    async fn get_body(&self, request: HttpRequest, call: &'static str) -> Result<String, ProviderError> {
        let attempts = self.retry.attempts();
        let timeout = self.retry.timeout;
        let mut attempt = 0;

        loop {
            let permit = self.breaker.check()?;
            self.pacer.wait().await;

            debug!(provider = %self.provider, call, attempt, "upstream request");
            let request = request.clone().with_timeout(timeout);
            let outcome = match tokio::time::timeout(timeout, self.http_client.execute(request)).await {
                Ok(Ok(response)) => self.classify_response(response, call),
                Ok(Err(error)) => Err(self.classify_transport(error, call)),
                Err(_) => Err(ProviderError::timeout(format!(
                    "{} {call} timed out after {}ms",
                    self.provider,
                    timeout.as_millis()
                ))),
            };

            let error = match outcome {
                Ok(body) => {
                    permit.succeeded();
                    return Ok(body);
                }
                Err(error) => error,
            };

            if is_outage(&error) {
                permit.failed();
            } else {
                permit.succeeded();
            }

            attempt += 1;
            if !error.retryable() || attempt >= attempts {
                debug!(provider = %self.provider, call, attempt, error = %error, "upstream call failed");
                return Err(error);
            }

            let delay = self.retry.retry_delay();
            warn!(
                provider = %self.provider,
                call,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying upstream call"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn classify_response(&self, response: HttpResponse, call: &str) -> Result<String, ProviderError> {
        let provider = self.provider;
        match response.status {
            status if (200..300).contains(&status) => Ok(response.body),
            404 => Err(ProviderError::not_found(format!(
                "{provider} {call}: symbol not found"
            ))),
            429 => Err(ProviderError::rate_limited(format!(
                "{provider} {call}: upstream rate limit (429)"
            ))),
            401 | 403 => Err(ProviderError::rejected(format!(
                "{provider} {call}: credentials rejected ({})",
                response.status
            ))),
            408 | 500..=599 => Err(ProviderError::unavailable(format!(
                "{provider} {call}: upstream returned status {}",
                response.status
            ))),
            status => Err(ProviderError::rejected(format!(
                "{provider} {call}: upstream returned status {status}"
            ))),
        }
    }

    fn classify_transport(&self, error: HttpError, call: &str) -> ProviderError {
        if error.timed_out() {
            ProviderError::timeout(format!("{} {call}: {error}", self.provider))
        } else {
            ProviderError::unavailable(format!("{} {call}: {error}", self.provider))
        }
    }
}

fn is_outage(error: &ProviderError) -> bool {
    matches!(
        error.kind(),
        ProviderErrorKind::Timeout | ProviderErrorKind::RateLimited | ProviderErrorKind::Unavailable
    ) && error.retryable()
}
