pub mod error;
pub mod publisher;
pub mod repository;
pub mod source;

pub use error::{LedgerError, NormalizationError, PublishError, SourceError, StatsError};
pub use publisher::{PublishResult, Publisher};
pub use repository::{LedgerStore, StatsStore};
pub use source::{FetchRequest, OfferSource};
