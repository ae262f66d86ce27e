use chrono::{DateTime, Utc};
use dealflow_shared::{Offer, RejectionReason};
use dealflow_store::app_config::DecisionConfig;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::filters::FilterRules;
use crate::ledger::DedupLedger;
use crate::models::{Decision, ScoredOffer};
use crate::scoring::Scorer;

/// Turns a pool of normalized offers into a ranked, capped, deduplicated selection.
///
/// Pure and synchronous: all I/O (loading and persisting the ledger) happens in
/// the caller. Given the same offers, config, ledger state and `now`, the output
/// is identical regardless of input order; duplicate copies of one offer are
/// resolved by `compare_copies`, not by arrival.
pub struct DecisionEngine {
    config: DecisionConfig,
    rules: FilterRules,
    scorer: Scorer,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        let rules = FilterRules::from_config(&config);
        let scorer = Scorer::from_config(&config);
        Self { config, rules, scorer }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Filter, score, rank, apply diversity caps, truncate to quota and record
    /// every selection in `ledger`.
    pub fn decide(&self, offers: Vec<Offer>, ledger: &mut DedupLedger, now: DateTime<Utc>) -> Decision {
        let mut decision = Decision::default();

        // 1. Collapse in-batch duplicates, then hard filters
        let unique = self.dedupe_batch(offers, &mut decision);
        let mut eligible = Vec::with_capacity(unique.len());
        for offer in unique {
            match self.rules.check(&offer, ledger, now) {
                Ok(()) => eligible.push(offer),
                Err(reason) => {
                    debug!("Rejected {} ({}): {}", offer.fingerprint, offer.title, reason);
                    decision.reject(reason);
                }
            }
        }
        decision.considered = eligible.len();

        if eligible.is_empty() {
            info!("No eligible offers after filtering ({} rejected)", decision.total_rejected());
            return decision;
        }

        // 2. Score, then 4. rank with deterministic tie-breaks
        let scores = self.scorer.score_batch(&eligible, ledger, now);
        let mut ranked: Vec<ScoredOffer> = eligible
            .into_iter()
            .zip(scores)
            .map(|(offer, score)| ScoredOffer { offer, score, rank: 0 })
            .collect();
        ranked.sort_by(compare_ranked);
        for (i, scored) in ranked.iter_mut().enumerate() {
            scored.rank = i + 1;
        }

        // 3. Diversity caps, 5. quota
        let selected = self.select_diverse(ranked);

        for scored in &selected {
            ledger.record_selection(&scored.offer, now);
            info!(
                "Selected #{} {} [{}] score={:.3} commission={:.1}% discount={:.1}%",
                scored.rank,
                scored.offer.title,
                scored.offer.category,
                scored.score,
                scored.offer.commission_rate,
                scored.offer.discount_percent
            );
        }
        decision.selected = selected;
        decision
    }

    /// Keep one offer per fingerprint, the preferred copy by `compare_copies`.
    fn dedupe_batch(&self, offers: Vec<Offer>, decision: &mut Decision) -> Vec<Offer> {
        let mut index: HashMap<_, usize> = HashMap::with_capacity(offers.len());
        let mut unique: Vec<Offer> = Vec::with_capacity(offers.len());
        for offer in offers {
            match index.get(&offer.fingerprint) {
                Some(&i) => {
                    decision.reject(RejectionReason::DuplicateInBatch);
                    if compare_copies(&offer, &unique[i]).is_lt() {
                        unique[i] = offer;
                    }
                }
                None => {
                    index.insert(offer.fingerprint.clone(), unique.len());
                    unique.push(offer);
                }
            }
        }
        unique
    }

    /// Walk the ranking and take candidates while their category has room.
    /// Over-cap candidates are set aside in rank order and, with backfill on,
    /// fill whatever quota is left afterwards. The per-source cap is never
    /// relaxed.
    fn select_diverse(&self, ranked: Vec<ScoredOffer>) -> Vec<ScoredOffer> {
        let quota = self.config.quota;
        let mut per_category: HashMap<String, usize> = HashMap::new();
        let mut per_source: HashMap<String, usize> = HashMap::new();
        let mut selected = Vec::with_capacity(quota);
        let mut deferred = Vec::new();

        for candidate in ranked {
            if selected.len() >= quota {
                break;
            }
            if self.source_full(&per_source, &candidate) {
                continue;
            }
            let category_count = per_category.get(&candidate.offer.category).copied().unwrap_or(0);
            if category_count >= self.config.max_per_category {
                deferred.push(candidate);
                continue;
            }
            *per_category.entry(candidate.offer.category.clone()).or_insert(0) += 1;
            *per_source.entry(candidate.offer.source_id.clone()).or_insert(0) += 1;
            selected.push(candidate);
        }

        if self.config.allow_category_backfill && selected.len() < quota {
            for candidate in deferred {
                if selected.len() >= quota {
                    break;
                }
                if self.source_full(&per_source, &candidate) {
                    continue;
                }
                *per_source.entry(candidate.offer.source_id.clone()).or_insert(0) += 1;
                selected.push(candidate);
            }
            selected.sort_by(|a, b| a.rank.cmp(&b.rank));
        }
        selected
    }

    fn source_full(&self, per_source: &HashMap<String, usize>, candidate: &ScoredOffer) -> bool {
        let count = per_source.get(&candidate.offer.source_id).copied().unwrap_or(0);
        self.config.max_per_source.is_some_and(|cap| count >= cap)
    }
}

/// Preference between two copies of the same offer in one batch: cheaper,
/// then higher commission, then deeper discount, then title, url and category.
fn compare_copies(a: &Offer, b: &Offer) -> Ordering {
    a.price
        .total_cmp(&b.price)
        .then_with(|| b.commission_rate.total_cmp(&a.commission_rate))
        .then_with(|| b.discount_percent.total_cmp(&a.discount_percent))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.category.cmp(&b.category))
}

/// Score descending, then commission descending, then fingerprint ascending.
fn compare_ranked(a: &ScoredOffer, b: &ScoredOffer) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.offer.commission_rate.total_cmp(&a.offer.commission_rate))
        .then_with(|| a.offer.fingerprint.cmp(&b.offer.fingerprint))
}
