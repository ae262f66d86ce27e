use async_trait::async_trait;
use dealflow_core::{PublishError, PublishResult, Publisher};
use dealflow_offer::ScoredOffer;
use dealflow_shared::Offer;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Sends each offer to every configured publisher.
/// An offer counts as published when at least one publisher accepts it.
pub struct FanoutPublisher {
    publishers: Vec<Arc<dyn Publisher>>,
}

impl FanoutPublisher {
    pub fn new(publishers: Vec<Arc<dyn Publisher>>) -> Self {
        Self { publishers }
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

#[async_trait]
impl Publisher for FanoutPublisher {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn publish(&self, offer: &Offer) -> PublishResult {
        if self.publishers.is_empty() {
            return Err(PublishError::Rejected("no publishers configured".to_string()));
        }

        let mut delivered = 0;
        let mut last_error = None;
        for publisher in &self.publishers {
            match publisher.publish(offer).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Publisher {} failed for {}: {}", publisher.name(), offer.fingerprint, e);
                    last_error = Some(e);
                }
            }
        }

        match (delivered, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub published: usize,
    pub failed: usize,
}

/// Hand every selected offer to `publisher` exactly once, in selection order.
/// A failure is counted and the remaining offers are still dispatched.
pub async fn dispatch(publisher: &dyn Publisher, selected: &[ScoredOffer]) -> DispatchReport {
    let mut report = DispatchReport::default();
    for scored in selected {
        match publisher.publish(&scored.offer).await {
            Ok(()) => {
                info!("Published {} via {}", scored.offer.title, publisher.name());
                report.published += 1;
            }
            Err(e) => {
                error!("Failed to publish {}: {}", scored.offer.title, e);
                report.failed += 1;
            }
        }
    }
    report
}
