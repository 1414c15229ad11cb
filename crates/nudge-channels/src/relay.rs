//! Relay implementations behind [`MessageRelay`].
//!
//! [`WebhookRelay`] POSTs each reply as JSON to the gateway with a short
//! exponential backoff on transient failures. [`DisabledRelay`] stands in
//! when no gateway URL is configured so reply-mode jobs fail loudly instead
//! of silently dropping output.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use nudge_core::{config::RelayConfig, MessageRelay};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{error::RelayError, types::RelayMessage};

/// First retry delay.
const BACKOFF_BASE_MS: u64 = 250;
/// Delay ceiling between attempts.
const BACKOFF_MAX_MS: u64 = 4_000;
/// Total attempts per message, the first one included.
const MAX_ATTEMPTS: u32 = 3;
/// Jitter fraction applied to each delay (10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Build the relay described by `config`.
pub fn build_relay(config: &RelayConfig) -> Result<Arc<dyn MessageRelay>, RelayError> {
    match config.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            let relay = WebhookRelay::new(url, config.token.clone(), config.timeout_ms)?;
            info!(url = %url, "webhook relay configured");
            Ok(Arc::new(relay))
        }
        _ => {
            info!("no relay url configured; reply delivery disabled");
            Ok(Arc::new(DisabledRelay))
        }
    }
}

/// Posts replies to an HTTP gateway.
pub struct WebhookRelay {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout_ms: u64,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl WebhookRelay {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, RelayError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RelayError::ConfigError(format!(
                "relay url must be http(s): {url}"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| RelayError::ConfigError(e.to_string()))?;
        Ok(Self {
            client,
            url,
            token,
            timeout_ms,
            max_attempts: MAX_ATTEMPTS,
            backoff_base_ms: BACKOFF_BASE_MS,
        })
    }

    /// Override the retry policy. `max_attempts` is clamped to at least one.
    pub fn with_retry(mut self, max_attempts: u32, backoff_base_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_once(&self, message: &RelayMessage) -> Result<(), RelayError> {
        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(message);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::Timeout {
                    ms: self.timeout_ms,
                }
            } else {
                RelayError::SendFailed(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        if resp.status().is_success() {
            return Ok(());
        }
        if status == 401 || status == 403 {
            return Err(RelayError::AuthFailed(status));
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RelayError::Rejected {
            status,
            body: body.chars().take(200).collect(),
        })
    }

    /// Send with exponential backoff and jitter on retryable failures.
    async fn post_with_backoff(&self, message: &RelayMessage) -> Result<(), RelayError> {
        let mut delay_ms = self.backoff_base_ms;

        for attempt in 1..=self.max_attempts {
            match self.post_once(message).await {
                Ok(()) => {
                    debug!(route = %message.route, attempt, "reply relayed");
                    return Ok(());
                }
                Err(e) if attempt == self.max_attempts || !e.is_retryable() => {
                    return Err(e);
                }
                Err(e) => {
                    let total = delay_ms + jitter_ms(delay_ms);
                    warn!(
                        route = %message.route,
                        attempt,
                        max = self.max_attempts,
                        retry_in_ms = total,
                        error = %e,
                        "relay failed, retrying"
                    );
                    sleep(Duration::from_millis(total)).await;
                    delay_ms = (delay_ms * 2).min(BACKOFF_MAX_MS);
                }
            }
        }

        Err(RelayError::ConfigError("relay attempts exhausted".to_string()))
    }
}

#[async_trait]
impl MessageRelay for WebhookRelay {
    async fn relay(&self, route_ref: &str, text: &str) -> nudge_core::Result<()> {
        let message = RelayMessage {
            route: route_ref.to_string(),
            text: text.to_string(),
        };
        self.post_with_backoff(&message)
            .await
            .map_err(|e| e.into_nudge(route_ref))
    }
}

/// Relay used when no gateway is configured. Every call fails.
pub struct DisabledRelay;

#[async_trait]
impl MessageRelay for DisabledRelay {
    async fn relay(&self, route_ref: &str, _text: &str) -> nudge_core::Result<()> {
        Err(RelayError::ConfigError("no relay url configured".to_string()).into_nudge(route_ref))
    }
}

/// Jitter offset in `0 .. JITTER_FRACTION * base_ms`.
fn jitter_ms(base_ms: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let max_jitter = ((base_ms as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}
