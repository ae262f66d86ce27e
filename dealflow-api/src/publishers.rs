use async_trait::async_trait;
use dealflow_core::{PublishError, PublishResult, Publisher};
use dealflow_shared::Offer;
use std::time::Duration;
use tracing::info;

/// POSTs the canonical offer JSON to a content / publishing service.
pub struct WebhookPublisher {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookPublisher {
    /// A zero `timeout` means no deadline.
    pub fn new(name: &str, url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, offer: &Offer) -> PublishResult {
        let resp = self
            .client
            .post(&self.url)
            .json(offer)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Rejected(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(())
    }
}

/// Logs the offer instead of sending it anywhere.
pub struct LogPublisher {
    name: String,
}

impl LogPublisher {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, offer: &Offer) -> PublishResult {
        info!(
            publisher = %self.name,
            fingerprint = %offer.fingerprint,
            "{} | {} | ${:.2} (was ${:.2}, {:.0}% off) | {:.1}% commission | {}",
            offer.category,
            offer.title,
            offer.price,
            offer.original_price,
            offer.discount_percent,
            offer.commission_rate,
            offer.url
        );
        Ok(())
    }
}
