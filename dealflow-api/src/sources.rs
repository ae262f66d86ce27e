use async_trait::async_trait;
use dealflow_core::{FetchRequest, OfferSource, SourceError};
use dealflow_shared::RawOffer;
use dealflow_store::app_config::{Network, SourceConfig};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Keys under which a feed may wrap its offer array.
const ENVELOPE_KEYS: [&str; 3] = ["offers", "items", "products"];

/// Network feed served over HTTP as JSON.
pub struct HttpFeedSource {
    id: String,
    network: Network,
    url: String,
    api_key: Option<String>,
    default_commission_rate: Option<f64>,
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(config: &SourceConfig, url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            id: config.id.clone(),
            network: config.network,
            url: url.to_string(),
            api_key: config.api_key.clone(),
            default_commission_rate: config.default_commission_rate,
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl OfferSource for HttpFeedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn default_commission_rate(&self) -> Option<f64> {
        self.default_commission_rate
    }

    async fn fetch_offers(&self, request: &FetchRequest) -> Result<Vec<RawOffer>, SourceError> {
        let mut req = self.client.get(&self.url).query(&[("limit", request.limit)]);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(classify_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body: Value = resp.json().await.map_err(classify_transport)?;
        let mut offers = decode_items(self.network, body)?;
        offers.truncate(request.limit);
        debug!("Source {} returned {} offer(s)", self.id, offers.len());
        Ok(offers)
    }
}

/// Rate limits, timeouts and server errors are worth retrying; anything else
/// (bad credentials, bad request) will fail the same way next time.
pub fn classify_status(status: StatusCode, body: &str) -> SourceError {
    let message = format!("HTTP {}: {}", status.as_u16(), body.chars().take(200).collect::<String>());
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SourceError::Transient(message)
    } else {
        SourceError::Fatal(message)
    }
}

fn classify_transport(err: reqwest::Error) -> SourceError {
    if err.is_timeout() || err.is_connect() || err.is_body() {
        SourceError::Transient(err.to_string())
    } else if err.is_decode() {
        SourceError::Fatal(format!("undecodable response: {}", err))
    } else {
        SourceError::Fatal(err.to_string())
    }
}

/// Turn a JSON array (bare or wrapped in an envelope object) into raw offers of
/// the given network. Items that do not match the network's shape are skipped.
pub fn decode_items(network: Network, body: Value) -> Result<Vec<RawOffer>, SourceError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match ENVELOPE_KEYS.iter().find_map(|key| map.remove(*key)) {
            Some(Value::Array(items)) => items,
            _ => return Err(SourceError::Fatal("response has no offer array".into())),
        },
        _ => return Err(SourceError::Fatal("response is not a JSON array".into())),
    };

    let mut offers = Vec::with_capacity(items.len());
    for item in items {
        match to_raw(network, item) {
            Ok(raw) => offers.push(raw),
            Err(e) => warn!("Skipping malformed {:?} item: {}", network, e),
        }
    }
    Ok(offers)
}

fn to_raw(network: Network, item: Value) -> Result<RawOffer, serde_json::Error> {
    Ok(match network {
        Network::Amazon => RawOffer::Amazon(serde_json::from_value(item)?),
        Network::Cj => RawOffer::Cj(serde_json::from_value(item)?),
        Network::Impact => RawOffer::Impact(serde_json::from_value(item)?),
        Network::Generic => RawOffer::Generic(serde_json::from_value(item)?),
    })
}

/// Offers read from a local JSON file on every fetch. Used for demos and dry runs.
pub struct FixtureSource {
    id: String,
    network: Network,
    path: PathBuf,
    default_commission_rate: Option<f64>,
}

impl FixtureSource {
    pub fn new(config: &SourceConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            id: config.id.clone(),
            network: config.network,
            path: path.into(),
            default_commission_rate: config.default_commission_rate,
        }
    }
}

#[async_trait]
impl OfferSource for FixtureSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn default_commission_rate(&self) -> Option<f64> {
        self.default_commission_rate
    }

    async fn fetch_offers(&self, request: &FetchRequest) -> Result<Vec<RawOffer>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::Fatal(format!("fixture {} not found", self.path.display())),
            _ => SourceError::Transient(format!("reading {}: {}", self.path.display(), e)),
        })?;
        let body: Value = serde_json::from_str(&content)
            .map_err(|e| SourceError::Fatal(format!("fixture {} is not JSON: {}", self.path.display(), e)))?;

        let mut offers = decode_items(self.network, body)?;
        offers.truncate(request.limit);
        Ok(offers)
    }
}
