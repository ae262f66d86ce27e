use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub publishers: Vec<PublisherConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port(), enabled: true }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

/// Relative priority of the three scoring features. Must sum to 1.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScoringWeights {
    pub commission: f64,
    pub discount: f64,
    pub category_recency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { commission: 0.5, discount: 0.3, category_recency: 0.2 }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.commission + self.discount + self.category_recency
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecisionConfig {
    #[serde(default = "default_quota")]
    pub quota: usize,
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    #[serde(default = "default_min_commission_rate")]
    pub min_commission_rate: f64,
    #[serde(default = "default_min_discount_percent")]
    pub min_discount_percent: f64,
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,
    pub max_per_source: Option<usize>,
    /// Let over-cap candidates fill the quota when other categories run out.
    /// `false` makes the category cap strict.
    #[serde(default = "default_true")]
    pub allow_category_backfill: bool,
    pub min_rating: Option<f64>,
    pub min_reviews: Option<u32>,
    /// Reject offers that carry no image URL.
    #[serde(default)]
    pub require_image: bool,
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default = "default_week_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_week_seconds")]
    pub category_recency_horizon_seconds: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            min_commission_rate: default_min_commission_rate(),
            min_discount_percent: default_min_discount_percent(),
            max_per_category: default_max_per_category(),
            max_per_source: None,
            allow_category_backfill: true,
            min_rating: None,
            min_reviews: None,
            require_image: false,
            weights: ScoringWeights::default(),
            cooldown_seconds: default_week_seconds(),
            category_recency_horizon_seconds: default_week_seconds(),
        }
    }
}

impl DecisionConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_seconds as i64)
    }

    pub fn category_recency_horizon(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.category_recency_horizon_seconds as i64)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let w = &self.weights;
        if w.commission < 0.0 || w.discount < 0.0 || w.category_recency < 0.0 {
            return Err(ConfigValidationError("decision.weights must be non-negative".into()));
        }
        if (w.sum() - 1.0).abs() > 1e-6 {
            return Err(ConfigValidationError(format!(
                "decision.weights must sum to 1, got {}",
                w.sum()
            )));
        }
        if self.min_price > self.max_price {
            return Err(ConfigValidationError(format!(
                "decision.min_price {} exceeds max_price {}",
                self.min_price, self.max_price
            )));
        }
        if self.quota == 0 {
            return Err(ConfigValidationError("decision.quota must be at least 1".into()));
        }
        if self.max_per_category == 0 {
            return Err(ConfigValidationError("decision.max_per_category must be at least 1".into()));
        }
        if self.max_per_source == Some(0) {
            return Err(ConfigValidationError("decision.max_per_source must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CycleConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_source_timeout_seconds")]
    pub source_timeout_seconds: u64,
    #[serde(default = "default_offers_per_source")]
    pub offers_per_source: usize,
    #[serde(default = "default_true")]
    pub run_immediately: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            source_timeout_seconds: default_source_timeout_seconds(),
            offers_per_source: default_offers_per_source(),
            run_immediately: true,
        }
    }
}

impl CycleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Fraction of each delay randomized away, 0 disables jitter.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Memory,
    File,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_backend")]
    pub backend: LedgerBackend,
    #[serde(default = "default_ledger_path")]
    pub path: String,
    pub redis_url: Option<String>,
    #[serde(default = "default_ledger_key_prefix")]
    pub key_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
            path: default_ledger_path(),
            redis_url: None,
            key_prefix: default_ledger_key_prefix(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatsBackend {
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_backend")]
    pub backend: StatsBackend,
    #[serde(default = "default_stats_path")]
    pub path: String,
    pub database_url: Option<String>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            backend: default_stats_backend(),
            path: default_stats_path(),
            database_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Fixture,
}

/// Which response shape a source speaks; selects the normalizer branch.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Amazon,
    Cj,
    Impact,
    Generic,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub id: String,
    pub network: Network,
    pub kind: SourceKind,
    pub url: Option<String>,
    pub path: Option<String>,
    pub api_key: Option<String>,
    pub default_commission_rate: Option<f64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    Webhook,
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublisherConfig {
    pub name: String,
    pub kind: PublisherKind,
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigValidationError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),
}

fn default_port() -> u16 { 8080 }
fn default_true() -> bool { true }
fn default_quota() -> usize { 2 }
fn default_min_price() -> f64 { 10.0 }
fn default_max_price() -> f64 { 500.0 }
fn default_min_commission_rate() -> f64 { 5.0 }
fn default_min_discount_percent() -> f64 { 15.0 }
fn default_max_per_category() -> usize { 1 }
fn default_week_seconds() -> u64 { 7 * 24 * 3600 }
fn default_interval_seconds() -> u64 { 3600 }
fn default_source_timeout_seconds() -> u64 { 30 }
fn default_offers_per_source() -> usize { 20 }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 10_000 }
fn default_multiplier() -> f64 { 2.0 }
fn default_jitter() -> f64 { 0.1 }
fn default_ledger_backend() -> LedgerBackend { LedgerBackend::File }
fn default_ledger_path() -> String { "data/ledger.json".into() }
fn default_ledger_key_prefix() -> String { "dealflow:ledger".into() }
fn default_stats_backend() -> StatsBackend { StatsBackend::File }
fn default_stats_path() -> String { "data/cycles.jsonl".into() }

impl Config {
    pub fn load() -> Result<Self, ConfigLoadError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `DEALFLOW__DECISION__QUOTA=3` sets `decision.quota`
            .add_source(config::Environment::with_prefix("DEALFLOW").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.decision.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigValidationError("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigValidationError("retry.multiplier must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigValidationError("retry.jitter must be within [0, 1]".into()));
        }
        let mut ids = std::collections::HashSet::new();
        for source in &self.sources {
            if !ids.insert(source.id.as_str()) {
                return Err(ConfigValidationError(format!("duplicate source id `{}`", source.id)));
            }
        }
        Ok(())
    }
}
