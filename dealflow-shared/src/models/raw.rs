use serde::{Deserialize, Serialize};

/// A number as networks actually send it: sometimes JSON numbers, sometimes strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    /// Parse the amount, tolerating a leading currency sign and thousands separators.
    pub fn parse(&self) -> Option<f64> {
        match self {
            Amount::Number(n) => Some(*n),
            Amount::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .trim_start_matches(['$', '€', '£'])
                    .trim_end_matches('%')
                    .chars()
                    .filter(|c| *c != ',')
                    .collect();
                cleaned.trim().parse::<f64>().ok()
            }
        }
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::Number(value)
    }
}

/// Raw offer as returned by one marketplace network, before normalization.
///
/// One variant per response shape; the normalizer is the only code that looks inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "network", rename_all = "snake_case")]
pub enum RawOffer {
    Amazon(AmazonItem),
    Cj(CjProduct),
    Impact(ImpactItem),
    Generic(GenericOffer),
}

impl RawOffer {
    pub fn network(&self) -> &'static str {
        match self {
            RawOffer::Amazon(_) => "amazon",
            RawOffer::Cj(_) => "cj",
            RawOffer::Impact(_) => "impact",
            RawOffer::Generic(_) => "generic",
        }
    }

    /// Network-native id, when present. Used for log context on failures.
    pub fn external_id(&self) -> Option<&str> {
        match self {
            RawOffer::Amazon(item) => item.asin.as_deref(),
            RawOffer::Cj(item) => item.id.as_deref(),
            RawOffer::Impact(item) => item.catalog_item_id.as_deref(),
            RawOffer::Generic(item) => item.id.as_deref(),
        }
    }
}

/// Product Advertising style item. Prices are decimal, commission is a percentage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmazonItem {
    pub asin: Option<String>,
    pub title: Option<String>,
    pub detail_page_url: Option<String>,
    pub browse_node: Option<String>,
    pub price: Option<Amount>,
    pub list_price: Option<Amount>,
    pub savings_percent: Option<Amount>,
    pub commission_rate: Option<Amount>,
    pub merchant: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
}

/// Product-search style record. Prices are strings, commission is a fraction (0.08).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CjProduct {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub advertiser_category: Option<String>,
    pub advertiser_name: Option<String>,
    pub price: Option<Amount>,
    pub sale_price: Option<Amount>,
    pub commission_fraction: Option<Amount>,
    pub image_link: Option<String>,
}

/// Catalog item with prices in minor units (cents) and payout as a percentage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactItem {
    pub catalog_item_id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub current_price_cents: Option<Amount>,
    pub original_price_cents: Option<Amount>,
    pub payout_percent: Option<Amount>,
    pub manufacturer: Option<String>,
    pub image_url: Option<String>,
}

/// Already-canonical shape, used by fixture catalogs and hand-curated feeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericOffer {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "affiliate_url")]
    pub url: Option<String>,
    pub category: Option<String>,
    pub price: Option<Amount>,
    pub original_price: Option<Amount>,
    pub commission_rate: Option<Amount>,
    pub merchant: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parse() {
        assert_eq!(Amount::Number(12.5).parse(), Some(12.5));
        assert_eq!(Amount::Text("$1,299.99".into()).parse(), Some(1299.99));
        assert_eq!(Amount::Text(" 8% ".into()).parse(), Some(8.0));
        assert_eq!(Amount::Text("free".into()).parse(), None);
    }

    #[test]
    fn test_raw_offer_tagged_by_network() {
        let json = serde_json::json!({
            "network": "cj",
            "id": "cj-1",
            "title": "Stand Mixer",
            "price": "159.99",
            "sale_price": "89.99",
            "commission_fraction": 0.1
        });
        let raw: RawOffer = serde_json::from_value(json).unwrap();

        assert_eq!(raw.network(), "cj");
        assert_eq!(raw.external_id(), Some("cj-1"));
        match raw {
            RawOffer::Cj(p) => assert_eq!(p.sale_price, Some(Amount::Text("89.99".into()))),
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_generic_accepts_affiliate_url_alias() {
        let json = serde_json::json!({
            "network": "generic",
            "id": "g-1",
            "affiliate_url": "https://example.com/a"
        });
        let raw: RawOffer = serde_json::from_value(json).unwrap();
        match raw {
            RawOffer::Generic(g) => assert_eq!(g.url.as_deref(), Some("https://example.com/a")),
            other => panic!("unexpected variant {:?}", other),
        }
    }
}
