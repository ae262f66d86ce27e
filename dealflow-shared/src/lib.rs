pub mod models;

pub use models::cycle::{
    CycleOutcome, CycleRecord, RejectionReason, SourceErrorKind, SourceErrorRecord, StatsSummary,
};
pub use models::ledger::LedgerEntry;
pub use models::offer::{discount_percent, Fingerprint, Offer, DEFAULT_CATEGORY};
pub use models::raw::{AmazonItem, Amount, CjProduct, GenericOffer, ImpactItem, RawOffer};
