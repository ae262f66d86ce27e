use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const DEFAULT_CATEGORY: &str = "General";

/// Identity key for deduplication.
///
/// Derived from `(source_id, external_id)` only, so the same listing keeps its
/// fingerprint across cycles and restarts even when price or title change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(source_id: &str, external_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source_id.as_bytes());
        // unit separator keeps ("ab", "c") and ("a", "bc") apart
        hasher.update([0x1f]);
        hasher.update(external_id.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Canonical promotional listing, immutable once normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub fingerprint: Fingerprint,
    pub source_id: String,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub category: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percent: f64,
    /// Percentage of the sale price paid out (8.0 means 8 %).
    pub commission_rate: f64,
    pub fetched_at: DateTime<Utc>,
    pub merchant: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<u32>,
}

impl Offer {
    /// Build an offer from already-validated values.
    ///
    /// The fingerprint and discount are derived here so they can never drift
    /// from the fields they are computed from.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_id: impl Into<String>,
        external_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        price: f64,
        original_price: f64,
        commission_rate: f64,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let source_id = source_id.into();
        let external_id = external_id.into();
        Self {
            fingerprint: Fingerprint::compute(&source_id, &external_id),
            source_id,
            external_id,
            title: title.into(),
            url: url.into(),
            category: DEFAULT_CATEGORY.to_string(),
            price,
            original_price,
            discount_percent: discount_percent(price, original_price),
            commission_rate,
            fetched_at,
            merchant: None,
            image_url: None,
            rating: None,
            reviews: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_merchant(mut self, merchant: Option<String>) -> Self {
        self.merchant = merchant;
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_social_proof(mut self, rating: Option<f64>, reviews: Option<u32>) -> Self {
        self.rating = rating;
        self.reviews = reviews;
        self
    }

    /// Expected payout for one sale, in the offer's currency unit.
    pub fn commission_amount(&self) -> f64 {
        self.price * self.commission_rate / 100.0
    }
}

/// `(original - price) / original * 100`, clamped to `[0, 100]`.
pub fn discount_percent(price: f64, original_price: f64) -> f64 {
    if original_price <= 0.0 {
        return 0.0;
    }
    ((original_price - price) / original_price * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_source_scoped() {
        let a = Fingerprint::compute("amazon", "B0001");
        let b = Fingerprint::compute("amazon", "B0001");
        let c = Fingerprint::compute("cj", "B0001");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 32);
        assert_ne!(
            Fingerprint::compute("ab", "c"),
            Fingerprint::compute("a", "bc")
        );
    }

    #[test]
    fn test_discount_percent() {
        assert!((discount_percent(20.0, 30.0) - 33.333).abs() < 0.01);
        assert_eq!(discount_percent(20.0, 20.0), 0.0);
        // a list price below the sale price never yields a negative discount
        assert_eq!(discount_percent(25.0, 20.0), 0.0);
        assert_eq!(discount_percent(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_commission_amount() {
        let offer = Offer::new("cj", "1", "Blender", "https://x", 80.0, 100.0, 10.0, Utc::now());
        assert!((offer.commission_amount() - 8.0).abs() < 1e-9);
        assert_eq!(offer.category, DEFAULT_CATEGORY);
        assert!((offer.discount_percent - 20.0).abs() < 1e-9);
    }
}
