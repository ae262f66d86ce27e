use dealflow_core::{FetchRequest, OfferSource, SourceError};
use dealflow_shared::RawOffer;
use dealflow_store::app_config::RetryConfig;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::SourceOutcome;

/// Bounded exponential backoff for transient source failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }

    /// Retries without sleeping in between.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based), before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// `base_delay` with up to `jitter` of it randomly shaved off.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let shave = rand::thread_rng().gen_range(0.0..=self.jitter);
        base.mul_f64(1.0 - shave)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

async fn fetch_once(source: &dyn OfferSource, request: &FetchRequest, timeout: Duration) -> Result<Vec<RawOffer>, SourceError> {
    if timeout.is_zero() {
        return source.fetch_offers(request).await;
    }
    match tokio::time::timeout(timeout, source.fetch_offers(request)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Transient(format!("timed out after {:?}", timeout))),
    }
}

/// Fetch from one source, retrying transient failures under `policy`.
/// Fatal failures return immediately. A zero `timeout` disables the per-attempt deadline.
pub async fn fetch_with_retry(
    source: &dyn OfferSource,
    request: &FetchRequest,
    policy: &RetryPolicy,
    timeout: Duration,
) -> SourceOutcome {
    let source_id = source.id().to_string();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match fetch_once(source, request, timeout).await {
            Ok(raws) => {
                if attempt > 1 {
                    info!("Source {} recovered on attempt {}", source_id, attempt);
                }
                return SourceOutcome { source_id, attempts: attempt, result: Ok(raws) };
            }
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    "Source {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    source_id, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return SourceOutcome { source_id, attempts: attempt, result: Err(e) };
            }
        }
    }
}
