use anyhow::{bail, Context};
use dealflow_core::{LedgerStore, OfferSource, Publisher, StatsStore};
use dealflow_cycle::{CycleMetrics, CycleOrchestrator, FanoutPublisher};
use dealflow_store::app_config::{
    Config, CycleConfig, LedgerBackend, LedgerConfig, PublisherConfig, PublisherKind, SourceConfig, SourceKind,
    StatsBackend, StatsConfig,
};
use dealflow_store::{
    FileLedgerStore, JsonlStatsStore, MemoryLedgerStore, MemoryStatsStore, PgStatsStore, RedisLedgerStore,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::publishers::{LogPublisher, WebhookPublisher};
use crate::sources::{FixtureSource, HttpFeedSource};

/// Everything the binary runs, assembled from configuration.
pub struct Runtime {
    pub orchestrator: CycleOrchestrator,
    pub stats: Arc<dyn StatsStore>,
    pub metrics: Arc<CycleMetrics>,
}

pub async fn build(config: &Config) -> anyhow::Result<Runtime> {
    let ledger = build_ledger(&config.ledger).await?;
    let stats = build_stats(&config.stats).await?;
    let sources = build_sources(&config.sources, &config.cycle)?;
    let publisher = build_publisher(&config.publishers, &config.cycle)?;
    let metrics = Arc::new(CycleMetrics::new().context("Failed to register metrics")?);

    if sources.is_empty() {
        warn!("No enabled sources configured; cycles will select nothing");
    }

    let orchestrator = CycleOrchestrator::new(config, sources, publisher, ledger, stats.clone())
        .with_metrics(metrics.clone());

    Ok(Runtime { orchestrator, stats, metrics })
}

pub async fn build_ledger(config: &LedgerConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    let store: Arc<dyn LedgerStore> = match config.backend {
        LedgerBackend::Memory => {
            warn!("Using in-memory ledger; cooldowns will not survive a restart");
            Arc::new(MemoryLedgerStore::new())
        }
        LedgerBackend::File => {
            info!("Ledger file: {}", config.path);
            Arc::new(FileLedgerStore::new(&config.path))
        }
        LedgerBackend::Redis => {
            let url = config.redis_url.as_deref().context("ledger.redis_url is required for the redis backend")?;
            info!("Ledger in Redis under {}", config.key_prefix);
            Arc::new(RedisLedgerStore::new(url, &config.key_prefix).context("Failed to create Redis client")?)
        }
    };
    Ok(store)
}

pub async fn build_stats(config: &StatsConfig) -> anyhow::Result<Arc<dyn StatsStore>> {
    let store: Arc<dyn StatsStore> = match config.backend {
        StatsBackend::Memory => Arc::new(MemoryStatsStore::new()),
        StatsBackend::File => {
            info!("Cycle records appended to {}", config.path);
            Arc::new(JsonlStatsStore::new(&config.path))
        }
        StatsBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("stats.database_url is required for the postgres backend")?;
            let store = PgStatsStore::new(url).await.context("Failed to connect to Postgres")?;
            store.ensure_schema().await.context("Failed to create cycle_records table")?;
            Arc::new(store)
        }
    };
    Ok(store)
}

pub fn build_sources(configs: &[SourceConfig], cycle: &CycleConfig) -> anyhow::Result<Vec<Arc<dyn OfferSource>>> {
    let mut sources: Vec<Arc<dyn OfferSource>> = Vec::new();
    for source in configs.iter().filter(|s| s.enabled) {
        let built: Arc<dyn OfferSource> = match source.kind {
            SourceKind::Feed => {
                let Some(url) = source.url.as_deref() else {
                    bail!("source `{}`: url is required for feed sources", source.id);
                };
                Arc::new(
                    HttpFeedSource::new(source, url, cycle.source_timeout())
                        .with_context(|| format!("source `{}`: failed to build HTTP client", source.id))?,
                )
            }
            SourceKind::Fixture => {
                let Some(path) = source.path.as_deref() else {
                    bail!("source `{}`: path is required for fixture sources", source.id);
                };
                Arc::new(FixtureSource::new(source, path))
            }
        };
        info!("Source {} ({:?}, {:?}) enabled", source.id, source.network, source.kind);
        sources.push(built);
    }
    Ok(sources)
}

/// Fan-out over every enabled publisher; a log publisher when none is configured.
pub fn build_publisher(configs: &[PublisherConfig], cycle: &CycleConfig) -> anyhow::Result<Arc<dyn Publisher>> {
    let mut publishers: Vec<Arc<dyn Publisher>> = Vec::new();
    for publisher in configs.iter().filter(|p| p.enabled) {
        let built: Arc<dyn Publisher> = match publisher.kind {
            PublisherKind::Log => Arc::new(LogPublisher::new(&publisher.name)),
            PublisherKind::Webhook => {
                let Some(url) = publisher.url.as_deref() else {
                    bail!("publisher `{}`: url is required for webhooks", publisher.name);
                };
                Arc::new(
                    WebhookPublisher::new(&publisher.name, url, cycle.source_timeout())
                        .with_context(|| format!("publisher `{}`: failed to build HTTP client", publisher.name))?,
                )
            }
        };
        publishers.push(built);
    }

    if publishers.is_empty() {
        info!("No publishers configured, logging selections only");
        publishers.push(Arc::new(LogPublisher::new("log")));
    }
    Ok(Arc::new(FanoutPublisher::new(publishers)))
}
