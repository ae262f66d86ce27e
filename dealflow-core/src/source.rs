use async_trait::async_trait;
use dealflow_shared::RawOffer;

use crate::error::SourceError;

/// Parameters handed to every source on each fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Upper bound on offers the source should return.
    pub limit: usize,
}

/// One marketplace network. Must be side-effect free when it fails.
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Stable identifier, becomes `Offer::source_id`.
    fn id(&self) -> &str;

    /// Commission rate to assume when the network does not report one.
    fn default_commission_rate(&self) -> Option<f64> {
        None
    }

    async fn fetch_offers(&self, request: &FetchRequest) -> Result<Vec<RawOffer>, SourceError>;
}
