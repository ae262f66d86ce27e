use chrono::{DateTime, Duration, Utc};
use dealflow_shared::Offer;
use dealflow_store::app_config::{DecisionConfig, ScoringWeights};

use crate::ledger::DedupLedger;

/// Weighted sum of batch-relative features.
///
/// Each feature is min–max scaled over the batch being scored, so scores are
/// only comparable within one decision pass.
pub struct Scorer {
    weights: ScoringWeights,
    recency_horizon: Duration,
}

impl Scorer {
    pub fn new(weights: ScoringWeights, recency_horizon: Duration) -> Self {
        Self { weights, recency_horizon }
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(config.weights.clone(), config.category_recency_horizon())
    }

    /// One score per offer, in input order.
    pub fn score_batch(&self, offers: &[Offer], ledger: &DedupLedger, now: DateTime<Utc>) -> Vec<f64> {
        let commission: Vec<f64> = offers.iter().map(|o| o.commission_rate).collect();
        let discount: Vec<f64> = offers.iter().map(|o| o.discount_percent).collect();
        let recency: Vec<f64> = offers
            .iter()
            .map(|o| self.category_staleness(&o.category, ledger, now))
            .collect();

        let commission = min_max_scale(&commission);
        let discount = min_max_scale(&discount);
        let recency = min_max_scale(&recency);

        (0..offers.len())
            .map(|i| {
                self.weights.commission * commission[i]
                    + self.weights.discount * discount[i]
                    + self.weights.category_recency * recency[i]
            })
            .collect()
    }

    /// Seconds since the category was last promoted, capped at the horizon.
    /// Never-promoted categories sit at the cap, so fresh categories score highest.
    fn category_staleness(&self, category: &str, ledger: &DedupLedger, now: DateTime<Utc>) -> f64 {
        let horizon = self.recency_horizon.num_seconds().max(0);
        let elapsed = match ledger.category_last_selected(category) {
            Some(at) => (now - at).num_seconds().clamp(0, horizon),
            None => horizon,
        };
        elapsed as f64
    }
}

/// Scale values to [0, 1] relative to the batch. A batch with no spread
/// (including a single value) maps everything to the neutral 0.5.
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    if !spread.is_finite() || spread <= f64::EPSILON {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / spread).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: &str, commission: f64, original: f64, category: &str) -> Offer {
        Offer::new("src", id, "t", "https://x", 100.0, original, commission, Utc::now()).with_category(category)
    }

    #[test]
    fn test_min_max_scale() {
        assert_eq!(min_max_scale(&[]), Vec::<f64>::new());
        assert_eq!(min_max_scale(&[7.0]), vec![0.5]);
        assert_eq!(min_max_scale(&[3.0, 3.0]), vec![0.5, 0.5]);
        assert_eq!(min_max_scale(&[0.0, 5.0, 10.0]), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_single_offer_is_neutral() {
        let scorer = Scorer::new(ScoringWeights::default(), Duration::days(7));
        let scores = scorer.score_batch(&[offer("a", 8.0, 150.0, "Kitchen")], &DedupLedger::new(), Utc::now());
        assert!((scores[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weights_steer_priority() {
        let high_commission = offer("a", 20.0, 120.0, "Kitchen");
        let high_discount = offer("b", 6.0, 300.0, "Kitchen");
        let batch = [high_commission, high_discount];
        let ledger = DedupLedger::new();
        let now = Utc::now();

        let by_commission = Scorer::new(
            ScoringWeights { commission: 0.9, discount: 0.1, category_recency: 0.0 },
            Duration::days(7),
        );
        let scores = by_commission.score_batch(&batch, &ledger, now);
        assert!(scores[0] > scores[1]);

        let by_discount = Scorer::new(
            ScoringWeights { commission: 0.1, discount: 0.9, category_recency: 0.0 },
            Duration::days(7),
        );
        let scores = by_discount.score_batch(&batch, &ledger, now);
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn test_recently_promoted_category_scores_lower() {
        let now = Utc::now();
        let mut ledger = DedupLedger::new();
        ledger.record_selection(&offer("old", 8.0, 150.0, "Kitchen"), now - Duration::hours(1));

        let scorer = Scorer::new(
            ScoringWeights { commission: 0.0, discount: 0.0, category_recency: 1.0 },
            Duration::days(7),
        );
        let batch = [offer("a", 8.0, 150.0, "Kitchen"), offer("b", 8.0, 150.0, "Fitness")];
        let scores = scorer.score_batch(&batch, &ledger, now);

        assert_eq!(scores, vec![0.0, 1.0]);
    }
}
