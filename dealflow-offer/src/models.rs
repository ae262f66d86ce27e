use dealflow_shared::{Offer, RejectionReason};
use serde::Serialize;
use std::collections::BTreeMap;

/// Offer with its score for the current decision pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredOffer {
    pub offer: Offer,
    pub score: f64,
    /// 1-based position in the full score ranking, before diversity caps.
    pub rank: usize,
}

/// Outcome of one `DecisionEngine::decide` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Decision {
    /// Selected offers in final order, at most `quota` long.
    pub selected: Vec<ScoredOffer>,
    pub rejections: BTreeMap<RejectionReason, usize>,
    /// Offers that passed every hard filter and were scored.
    pub considered: usize,
}

impl Decision {
    pub fn offers(&self) -> impl Iterator<Item = &Offer> {
        self.selected.iter().map(|s| &s.offer)
    }

    pub fn rejected(&self, reason: RejectionReason) -> usize {
        self.rejections.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejections.values().sum()
    }

    pub(crate) fn reject(&mut self, reason: RejectionReason) {
        *self.rejections.entry(reason).or_insert(0) += 1;
    }
}
