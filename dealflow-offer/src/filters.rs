use chrono::{DateTime, Duration, Utc};
use dealflow_shared::{Offer, RejectionReason};
use dealflow_store::app_config::DecisionConfig;

use crate::ledger::DedupLedger;

/// Hard filters applied before scoring. An offer failing any rule is rejected, not scored.
#[derive(Debug, Clone)]
pub struct FilterRules {
    pub min_price: f64,
    pub max_price: f64,
    pub min_commission_rate: f64,
    pub min_discount_percent: f64,
    pub min_rating: Option<f64>,
    pub min_reviews: Option<u32>,
    pub require_image: bool,
    pub cooldown: Duration,
}

impl FilterRules {
    pub fn from_config(config: &DecisionConfig) -> Self {
        Self {
            min_price: config.min_price,
            max_price: config.max_price,
            min_commission_rate: config.min_commission_rate,
            min_discount_percent: config.min_discount_percent,
            min_rating: config.min_rating,
            min_reviews: config.min_reviews,
            require_image: config.require_image,
            cooldown: config.cooldown(),
        }
    }

    /// First rule the offer fails, checked cheapest first; the ledger lookup comes last.
    pub fn check(&self, offer: &Offer, ledger: &DedupLedger, now: DateTime<Utc>) -> Result<(), RejectionReason> {
        if offer.price < self.min_price || offer.price > self.max_price {
            return Err(RejectionReason::PriceOutOfRange);
        }
        if offer.commission_rate < self.min_commission_rate {
            return Err(RejectionReason::CommissionTooLow);
        }
        if offer.discount_percent < self.min_discount_percent {
            return Err(RejectionReason::DiscountTooLow);
        }
        if !self.passes_quality(offer) {
            return Err(RejectionReason::QualityTooLow);
        }
        if self.require_image && offer.image_url.is_none() {
            return Err(RejectionReason::MissingImage);
        }
        if !ledger.is_eligible(&offer.fingerprint, now, self.cooldown) {
            return Err(RejectionReason::CoolingDown);
        }
        Ok(())
    }

    fn passes_quality(&self, offer: &Offer) -> bool {
        if let Some(min) = self.min_rating {
            if offer.rating.map_or(true, |r| r < min) {
                return false;
            }
        }
        if let Some(min) = self.min_reviews {
            if offer.reviews.map_or(true, |r| r < min) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> FilterRules {
        FilterRules::from_config(&DecisionConfig {
            min_commission_rate: 5.0,
            min_discount_percent: 15.0,
            ..DecisionConfig::default()
        })
    }

    fn offer(price: f64, original: f64, commission: f64) -> Offer {
        Offer::new("src", format!("{}-{}", price, commission), "t", "https://x", price, original, commission, Utc::now())
    }

    #[test]
    fn test_discount_beats_commission() {
        let ledger = DedupLedger::new();
        let now = Utc::now();

        // 33 % off at 6 % commission passes, 9 % off at 9 % commission does not
        assert_eq!(rules().check(&offer(20.0, 30.0, 6.0), &ledger, now), Ok(()));
        assert_eq!(
            rules().check(&offer(20.0, 22.0, 9.0), &ledger, now),
            Err(RejectionReason::DiscountTooLow)
        );
    }

    #[test]
    fn test_price_and_commission_bounds() {
        let ledger = DedupLedger::new();
        let now = Utc::now();

        assert_eq!(rules().check(&offer(5.0, 10.0, 10.0), &ledger, now), Err(RejectionReason::PriceOutOfRange));
        assert_eq!(rules().check(&offer(600.0, 900.0, 10.0), &ledger, now), Err(RejectionReason::PriceOutOfRange));
        assert_eq!(rules().check(&offer(10.0, 20.0, 10.0), &ledger, now), Ok(()));
        assert_eq!(rules().check(&offer(500.0, 900.0, 10.0), &ledger, now), Ok(()));
        assert_eq!(rules().check(&offer(50.0, 100.0, 4.9), &ledger, now), Err(RejectionReason::CommissionTooLow));
    }

    #[test]
    fn test_quality_thresholds_require_the_field() {
        let ledger = DedupLedger::new();
        let now = Utc::now();
        let mut r = rules();
        r.min_rating = Some(4.0);
        r.min_reviews = Some(50);

        let unrated = offer(50.0, 100.0, 10.0);
        assert_eq!(r.check(&unrated, &ledger, now), Err(RejectionReason::QualityTooLow));

        let good = offer(50.0, 100.0, 10.0).with_social_proof(Some(4.5), Some(1250));
        assert_eq!(r.check(&good, &ledger, now), Ok(()));

        let few_reviews = offer(50.0, 100.0, 10.0).with_social_proof(Some(4.5), Some(10));
        assert_eq!(r.check(&few_reviews, &ledger, now), Err(RejectionReason::QualityTooLow));
    }

    #[test]
    fn test_image_required_only_when_configured() {
        let ledger = DedupLedger::new();
        let now = Utc::now();
        let bare = offer(50.0, 100.0, 10.0);
        assert_eq!(rules().check(&bare, &ledger, now), Ok(()));

        let mut r = rules();
        r.require_image = true;
        assert_eq!(r.check(&bare, &ledger, now), Err(RejectionReason::MissingImage));

        let pictured = offer(50.0, 100.0, 10.0).with_image_url(Some("https://img.example/a.jpg".into()));
        assert_eq!(r.check(&pictured, &ledger, now), Ok(()));
    }

    #[test]
    fn test_cooling_down() {
        let mut ledger = DedupLedger::new();
        let now = Utc::now();
        let o = offer(50.0, 100.0, 10.0);
        ledger.record_selection(&o, now - Duration::days(1));

        assert_eq!(rules().check(&o, &ledger, now), Err(RejectionReason::CoolingDown));
        assert_eq!(rules().check(&o, &ledger, now + Duration::days(6)), Ok(()));
    }
}
