pub mod engine;
pub mod filters;
pub mod ledger;
pub mod models;
pub mod normalizer;
pub mod scoring;

pub use engine::DecisionEngine;
pub use filters::FilterRules;
pub use ledger::DedupLedger;
pub use models::{Decision, ScoredOffer};
pub use normalizer::{normalize, normalize_batch, NormalizedBatch, SourceProfile};
pub use scoring::Scorer;
