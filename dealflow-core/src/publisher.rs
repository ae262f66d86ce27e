use async_trait::async_trait;
use dealflow_shared::Offer;

use crate::error::PublishError;

pub type PublishResult = Result<(), PublishError>;

/// Content generation / publishing collaborator, invoked once per selected offer.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, offer: &Offer) -> PublishResult;
}
