//! Maps each network's raw shape onto the canonical [`Offer`].
//!
//! This is the only place that knows about per-network units: cents vs. decimal
//! prices, commission fractions vs. percentages, string-encoded numbers.

use chrono::{DateTime, Utc};
use dealflow_core::NormalizationError;
use dealflow_shared::{
    AmazonItem, Amount, CjProduct, GenericOffer, ImpactItem, Offer, RawOffer, DEFAULT_CATEGORY,
};
use tracing::debug;

/// What the normalizer needs to know about the source an offer came from.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub id: String,
    /// Used when the network does not report a commission, as a percentage.
    pub default_commission_rate: Option<f64>,
}

impl SourceProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), default_commission_rate: None }
    }

    pub fn with_default_commission(mut self, rate: Option<f64>) -> Self {
        self.default_commission_rate = rate;
        self
    }
}

/// Result of normalizing one source's batch.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub offers: Vec<Offer>,
    /// `(external id if known, error)` for every dropped raw offer.
    pub failures: Vec<(Option<String>, NormalizationError)>,
}

pub fn normalize_batch(raws: &[RawOffer], source: &SourceProfile, fetched_at: DateTime<Utc>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for raw in raws {
        match normalize(raw, source, fetched_at) {
            Ok(offer) => batch.offers.push(offer),
            Err(e) => {
                debug!("Dropping {} offer {:?} from {}: {}", raw.network(), raw.external_id(), source.id, e);
                batch.failures.push((raw.external_id().map(str::to_string), e));
            }
        }
    }
    batch
}

/// Intermediate values every network is reduced to before validation.
struct Fields {
    external_id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    category: Option<String>,
    price: Option<f64>,
    original_price: Option<f64>,
    commission_rate: Option<f64>,
    merchant: Option<String>,
    image_url: Option<String>,
    rating: Option<f64>,
    reviews: Option<u32>,
}

pub fn normalize(raw: &RawOffer, source: &SourceProfile, fetched_at: DateTime<Utc>) -> Result<Offer, NormalizationError> {
    let fields = match raw {
        RawOffer::Amazon(item) => from_amazon(item)?,
        RawOffer::Cj(item) => from_cj(item)?,
        RawOffer::Impact(item) => from_impact(item)?,
        RawOffer::Generic(item) => from_generic(item)?,
    };
    build(fields, source, fetched_at)
}

fn from_amazon(item: &AmazonItem) -> Result<Fields, NormalizationError> {
    let price = number(&item.price, "price")?;
    let mut original_price = number(&item.list_price, "list_price")?;
    if original_price.is_none() {
        // no list price: reconstruct it from the advertised savings
        if let (Some(p), Some(savings)) = (price, number(&item.savings_percent, "savings_percent")?) {
            if savings > 0.0 && savings < 100.0 {
                original_price = Some(p / (1.0 - savings / 100.0));
            }
        }
    }
    Ok(Fields {
        external_id: item.asin.clone(),
        title: item.title.clone(),
        url: item.detail_page_url.clone(),
        category: item.browse_node.clone(),
        price,
        original_price,
        commission_rate: number(&item.commission_rate, "commission_rate")?,
        merchant: item.merchant.clone(),
        image_url: item.image_url.clone(),
        rating: item.rating,
        reviews: item.review_count,
    })
}

fn from_cj(item: &CjProduct) -> Result<Fields, NormalizationError> {
    let regular = number(&item.price, "price")?;
    let sale = number(&item.sale_price, "sale_price")?;
    let (price, original_price) = match (sale, regular) {
        (Some(sale), regular) => (Some(sale), regular),
        (None, regular) => (regular, None),
    };
    Ok(Fields {
        external_id: item.id.clone(),
        title: item.title.clone(),
        url: item.link.clone(),
        category: item.advertiser_category.clone(),
        price,
        original_price,
        // reported as a fraction of the sale
        commission_rate: number(&item.commission_fraction, "commission_fraction")?.map(|f| f * 100.0),
        merchant: item.advertiser_name.clone(),
        image_url: item.image_link.clone(),
        rating: None,
        reviews: None,
    })
}

fn from_impact(item: &ImpactItem) -> Result<Fields, NormalizationError> {
    let cents = |v: Option<f64>| v.map(|c| c / 100.0);
    Ok(Fields {
        external_id: item.catalog_item_id.clone(),
        title: item.name.clone(),
        url: item.url.clone(),
        category: item.category.clone(),
        price: cents(number(&item.current_price_cents, "current_price_cents")?),
        original_price: cents(number(&item.original_price_cents, "original_price_cents")?),
        commission_rate: number(&item.payout_percent, "payout_percent")?,
        merchant: item.manufacturer.clone(),
        image_url: item.image_url.clone(),
        rating: None,
        reviews: None,
    })
}

fn from_generic(item: &GenericOffer) -> Result<Fields, NormalizationError> {
    Ok(Fields {
        external_id: item.id.clone(),
        title: item.title.clone(),
        url: item.url.clone(),
        category: item.category.clone(),
        price: number(&item.price, "price")?,
        original_price: number(&item.original_price, "original_price")?,
        commission_rate: number(&item.commission_rate, "commission_rate")?,
        merchant: item.merchant.clone(),
        image_url: item.image_url.clone(),
        rating: item.rating,
        reviews: item.reviews,
    })
}

fn build(fields: Fields, source: &SourceProfile, fetched_at: DateTime<Utc>) -> Result<Offer, NormalizationError> {
    let external_id = required(fields.external_id, "id")?;
    let title = required(fields.title, "title")?;
    let url = required(fields.url, "url")?;
    let price = fields.price.ok_or(NormalizationError::MissingField("price"))?;

    if !price.is_finite() || price <= 0.0 {
        return Err(NormalizationError::OutOfRange { field: "price", value: price });
    }

    let original_price = match fields.original_price {
        Some(original) if !original.is_finite() => {
            return Err(NormalizationError::OutOfRange { field: "original_price", value: original });
        }
        Some(original) if original > 0.0 && original < price => {
            return Err(NormalizationError::OutOfRange { field: "original_price", value: original });
        }
        Some(original) if original > 0.0 => original,
        // missing or zero list price means "no discount"
        _ => price,
    };

    let commission_rate = fields
        .commission_rate
        .or(source.default_commission_rate)
        .ok_or(NormalizationError::MissingField("commission_rate"))?;
    if !commission_rate.is_finite() || commission_rate < 0.0 {
        return Err(NormalizationError::OutOfRange { field: "commission_rate", value: commission_rate });
    }

    if let Some(rating) = fields.rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err(NormalizationError::OutOfRange { field: "rating", value: rating });
        }
    }

    let category = fields
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    Ok(Offer::new(&source.id, external_id, title, url, price, original_price, commission_rate, fetched_at)
        .with_category(category)
        .with_merchant(non_empty(fields.merchant))
        .with_image_url(non_empty(fields.image_url))
        .with_social_proof(fields.rating, fields.reviews))
}

fn number(value: &Option<Amount>, field: &'static str) -> Result<Option<f64>, NormalizationError> {
    match value {
        None => Ok(None),
        Some(amount) => match amount.parse() {
            Some(n) => Ok(Some(n)),
            None => Err(NormalizationError::NonNumeric {
                field,
                value: match amount {
                    Amount::Text(s) => s.clone(),
                    Amount::Number(n) => n.to_string(),
                },
            }),
        },
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, NormalizationError> {
    non_empty(value).ok_or(NormalizationError::MissingField(field))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SourceProfile {
        SourceProfile::new("net-a")
    }

    fn generic(price: Option<Amount>, original: Option<Amount>, commission: Option<Amount>) -> RawOffer {
        RawOffer::Generic(GenericOffer {
            id: Some("g-1".into()),
            title: Some("  Yoga Mat ".into()),
            url: Some("https://example.com/mat".into()),
            category: Some("Fitness".into()),
            price,
            original_price: original,
            commission_rate: commission,
            ..Default::default()
        })
    }

    #[test]
    fn test_generic_passes_through() {
        let raw = generic(Some(20.0.into()), Some(30.0.into()), Some(6.0.into()));
        let offer = normalize(&raw, &profile(), Utc::now()).unwrap();

        assert_eq!(offer.source_id, "net-a");
        assert_eq!(offer.external_id, "g-1");
        assert_eq!(offer.title, "Yoga Mat");
        assert_eq!(offer.category, "Fitness");
        assert!((offer.discount_percent - 33.333).abs() < 0.01);
        assert_eq!(offer.commission_rate, 6.0);
    }

    #[test]
    fn test_cj_fraction_becomes_percentage() {
        let raw = RawOffer::Cj(CjProduct {
            id: Some("cj-9".into()),
            title: Some("Stand Mixer".into()),
            link: Some("https://cj.example/9".into()),
            price: Some(Amount::Text("159.99".into())),
            sale_price: Some(Amount::Text("$89.99".into())),
            commission_fraction: Some(Amount::Number(0.1)),
            ..Default::default()
        });
        let offer = normalize(&raw, &profile(), Utc::now()).unwrap();

        assert!((offer.commission_rate - 10.0).abs() < 1e-9);
        assert!((offer.price - 89.99).abs() < 1e-9);
        assert!((offer.original_price - 159.99).abs() < 1e-9);
        assert_eq!(offer.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_impact_cents_become_decimal() {
        let raw = RawOffer::Impact(ImpactItem {
            catalog_item_id: Some("imp-1".into()),
            name: Some("Resistance Bands".into()),
            url: Some("https://impact.example/1".into()),
            current_price_cents: Some(Amount::Number(7999.0)),
            original_price_cents: Some(Amount::Text("12999".into())),
            payout_percent: Some(Amount::Text("12%".into())),
            ..Default::default()
        });
        let offer = normalize(&raw, &profile(), Utc::now()).unwrap();

        assert!((offer.price - 79.99).abs() < 1e-9);
        assert!((offer.original_price - 129.99).abs() < 1e-9);
        assert_eq!(offer.commission_rate, 12.0);
    }

    #[test]
    fn test_amazon_list_price_from_savings_and_default_commission() {
        let raw = RawOffer::Amazon(AmazonItem {
            asin: Some("B000TEST".into()),
            title: Some("Headphones".into()),
            detail_page_url: Some("https://amazon.example/dp/B000TEST".into()),
            price: Some(Amount::Number(150.0)),
            savings_percent: Some(Amount::Number(40.0)),
            ..Default::default()
        });
        let source = profile().with_default_commission(Some(4.0));
        let offer = normalize(&raw, &source, Utc::now()).unwrap();

        assert!((offer.original_price - 250.0).abs() < 1e-9);
        assert!((offer.discount_percent - 40.0).abs() < 1e-9);
        assert_eq!(offer.commission_rate, 4.0);
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let no_price = generic(None, None, Some(5.0.into()));
        assert_eq!(
            normalize(&no_price, &profile(), Utc::now()),
            Err(NormalizationError::MissingField("price"))
        );

        let text_price = generic(Some(Amount::Text("call us".into())), None, Some(5.0.into()));
        assert!(matches!(
            normalize(&text_price, &profile(), Utc::now()),
            Err(NormalizationError::NonNumeric { field: "price", .. })
        ));

        let zero_price = generic(Some(0.0.into()), None, Some(5.0.into()));
        assert!(matches!(
            normalize(&zero_price, &profile(), Utc::now()),
            Err(NormalizationError::OutOfRange { field: "price", .. })
        ));

        let negative_commission = generic(Some(10.0.into()), None, Some((-1.0).into()));
        assert!(matches!(
            normalize(&negative_commission, &profile(), Utc::now()),
            Err(NormalizationError::OutOfRange { field: "commission_rate", .. })
        ));

        let no_commission = generic(Some(10.0.into()), None, None);
        assert_eq!(
            normalize(&no_commission, &profile(), Utc::now()),
            Err(NormalizationError::MissingField("commission_rate"))
        );

        let list_below_sale = generic(Some(30.0.into()), Some(20.0.into()), Some(5.0.into()));
        assert!(matches!(
            normalize(&list_below_sale, &profile(), Utc::now()),
            Err(NormalizationError::OutOfRange { field: "original_price", .. })
        ));
    }

    #[test]
    fn test_zero_list_price_means_no_discount() {
        let raw = generic(Some(29.0.into()), Some(0.0.into()), Some(200.0.into()));
        let offer = normalize(&raw, &profile(), Utc::now()).unwrap();
        assert_eq!(offer.original_price, 29.0);
        assert_eq!(offer.discount_percent, 0.0);
    }

    #[test]
    fn test_batch_keeps_going_past_failures() {
        let good = generic(Some(20.0.into()), Some(30.0.into()), Some(6.0.into()));
        let bad = RawOffer::Generic(GenericOffer { id: Some("g-2".into()), ..Default::default() });
        let batch = normalize_batch(&[bad, good], &profile(), Utc::now());

        assert_eq!(batch.offers.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0.as_deref(), Some("g-2"));
        assert_eq!(batch.failures[0].1, NormalizationError::MissingField("title"));
    }
}
