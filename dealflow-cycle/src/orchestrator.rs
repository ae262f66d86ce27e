use chrono::{DateTime, Utc};
use dealflow_core::{FetchRequest, LedgerStore, OfferSource, Publisher, SourceError, StatsStore};
use dealflow_offer::{normalize_batch, DecisionEngine, DedupLedger, SourceProfile};
use dealflow_shared::{CycleOutcome, CycleRecord, Offer, SourceErrorRecord};
use dealflow_store::app_config::{Config, CycleConfig};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::dispatch::dispatch;
use crate::metrics::CycleMetrics;
use crate::models::{CycleError, CycleState, SourceOutcome};
use crate::retry::{fetch_with_retry, RetryPolicy};

/// Drives one fetch → normalize → decide → dispatch → record pass at a time.
///
/// The orchestrator is the single writer of the ledger and stats stores; cycles
/// run strictly one after another because `run_cycle` takes `&mut self`.
pub struct CycleOrchestrator {
    sources: Vec<Arc<dyn OfferSource>>,
    publisher: Arc<dyn Publisher>,
    ledger: Arc<dyn LedgerStore>,
    stats: Arc<dyn StatsStore>,
    engine: DecisionEngine,
    retry: RetryPolicy,
    cycle: CycleConfig,
    metrics: Option<Arc<CycleMetrics>>,
    state: CycleState,
    last_cycle_number: Option<u64>,
}

impl CycleOrchestrator {
    pub fn new(
        config: &Config,
        sources: Vec<Arc<dyn OfferSource>>,
        publisher: Arc<dyn Publisher>,
        ledger: Arc<dyn LedgerStore>,
        stats: Arc<dyn StatsStore>,
    ) -> Self {
        Self {
            sources,
            publisher,
            ledger,
            stats,
            engine: DecisionEngine::new(config.decision.clone()),
            retry: RetryPolicy::from_config(&config.retry),
            cycle: config.cycle.clone(),
            metrics: None,
            state: CycleState::Idle,
            last_cycle_number: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CycleMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn cycle_config(&self) -> &CycleConfig {
        &self.cycle
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub async fn run_cycle(&mut self) -> CycleRecord {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle as of `now`. Always returns the record, including for
    /// aborted cycles; the record has already been appended to the stats store.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleRecord {
        let cycle_number = self.next_cycle_number().await;
        let span = info_span!("cycle", cycle = cycle_number);
        self.execute(cycle_number, now).instrument(span).await
    }

    async fn execute(&mut self, cycle_number: u64, now: DateTime<Utc>) -> CycleRecord {
        let clock = Instant::now();
        let mut record = CycleRecord::new(cycle_number, now);
        info!("Starting cycle #{} over {} source(s)", cycle_number, self.sources.len());

        if let Err(e) = self.drive(&mut record, now).await {
            error!("Cycle #{} aborted: {}", cycle_number, e);
            record.outcome = CycleOutcome::Aborted { reason: e.to_string() };
        }

        self.transition(CycleState::Recording);
        let elapsed = chrono::Duration::from_std(clock.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        record.finished_at = now + elapsed;

        if let Err(e) = self.stats.append(&record).await {
            error!("Failed to append cycle record #{}: {}", cycle_number, e);
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe_cycle(&record);
        }
        self.transition(CycleState::Idle);

        info!(
            "Cycle #{} finished: fetched={} normalized={} selected={} published={} source_errors={}",
            cycle_number,
            record.offers_fetched,
            record.offers_normalized,
            record.offers_selected,
            record.offers_published,
            record.errors.len()
        );
        record
    }

    async fn drive(&mut self, record: &mut CycleRecord, now: DateTime<Utc>) -> Result<(), CycleError> {
        self.transition(CycleState::Fetching);
        let outcomes = self.fetch_all().await;

        self.transition(CycleState::Normalizing);
        let pool = self.normalize_all(outcomes, record, now);

        self.transition(CycleState::Deciding);
        let entries = self.ledger.load().await?;
        let mut ledger = DedupLedger::from_entries(entries);
        let decision = self.engine.decide(pool, &mut ledger, now);

        for (reason, count) in &decision.rejections {
            info!("Rejected {} offer(s): {}", count, reason);
        }
        record.rejections = decision
            .rejections
            .iter()
            .map(|(reason, count)| (reason.as_str().to_string(), *count))
            .collect();

        // Persist before anything leaves the process, so a crash after
        // dispatch can never re-select the same offers.
        let touched = ledger.take_dirty();
        if !touched.is_empty() {
            self.ledger.upsert(&touched).await?;
        }
        record.offers_selected = decision.selected.len();

        self.transition(CycleState::Dispatching);
        let report = dispatch(self.publisher.as_ref(), &decision.selected).await;
        record.offers_published = report.published;
        record.publish_failures = report.failed;
        Ok(())
    }

    /// One task per source, all joined before returning. Outcomes keep source order.
    async fn fetch_all(&self) -> Vec<SourceOutcome> {
        let request = FetchRequest { limit: self.cycle.offers_per_source };
        let timeout = self.cycle.source_timeout();

        let tasks: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let request = request.clone();
                let policy = self.retry.clone();
                tokio::spawn(async move { fetch_with_retry(source.as_ref(), &request, &policy, timeout).await })
            })
            .collect();

        join_all(tasks)
            .await
            .into_iter()
            .zip(&self.sources)
            .map(|(joined, source)| {
                joined.unwrap_or_else(|e| SourceOutcome {
                    source_id: source.id().to_string(),
                    attempts: 1,
                    result: Err(SourceError::Fatal(format!("fetch task failed: {}", e))),
                })
            })
            .collect()
    }

    fn normalize_all(&self, outcomes: Vec<SourceOutcome>, record: &mut CycleRecord, now: DateTime<Utc>) -> Vec<Offer> {
        let mut pool = Vec::new();

        for (outcome, source) in outcomes.into_iter().zip(&self.sources) {
            let raws = match outcome.result {
                Ok(raws) => raws,
                Err(e) => {
                    warn!("Source {} failed after {} attempt(s): {}", outcome.source_id, outcome.attempts, e);
                    record.errors.push(SourceErrorRecord {
                        source_id: outcome.source_id,
                        kind: e.kind(),
                        message: e.message().to_string(),
                        attempts: outcome.attempts,
                    });
                    continue;
                }
            };

            record.offers_fetched += raws.len();
            if let Some(metrics) = &self.metrics {
                metrics.record_fetch(&outcome.source_id, raws.len());
            }

            let profile = SourceProfile::new(source.id()).with_default_commission(source.default_commission_rate());
            let batch = normalize_batch(&raws, &profile, now);
            for (external_id, failure) in &batch.failures {
                debug!(
                    "Dropped offer {} from {}: {}",
                    external_id.as_deref().unwrap_or("<no id>"),
                    outcome.source_id,
                    failure
                );
            }
            info!(
                "Source {}: {} fetched, {} normalized, {} dropped",
                outcome.source_id,
                raws.len(),
                batch.offers.len(),
                batch.failures.len()
            );

            record.offers_normalized += batch.offers.len();
            record.normalization_failures += batch.failures.len();
            pool.extend(batch.offers);
        }
        pool
    }

    async fn next_cycle_number(&mut self) -> u64 {
        let last = match self.last_cycle_number {
            Some(n) => n,
            None => match self.stats.latest_cycle_number().await {
                Ok(n) => n.unwrap_or(0),
                Err(e) => {
                    warn!("Could not read last cycle number, starting from 1: {}", e);
                    0
                }
            },
        };
        let next = last + 1;
        self.last_cycle_number = Some(next);
        next
    }

    fn transition(&mut self, to: CycleState) {
        debug!("{} -> {}", self.state, to);
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dealflow_core::PublishResult;
    use dealflow_shared::{Amount, GenericOffer, RawOffer};
    use dealflow_store::{MemoryLedgerStore, MemoryStatsStore};

    struct Fixed(Vec<RawOffer>);

    #[async_trait]
    impl OfferSource for Fixed {
        fn id(&self) -> &str {
            "fixed"
        }

        async fn fetch_offers(&self, _request: &FetchRequest) -> Result<Vec<RawOffer>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct Sink;

    #[async_trait]
    impl Publisher for Sink {
        fn name(&self) -> &str {
            "sink"
        }

        async fn publish(&self, _offer: &Offer) -> PublishResult {
            Ok(())
        }
    }

    fn generic(id: &str, price: f64) -> RawOffer {
        RawOffer::Generic(GenericOffer {
            id: Some(id.into()),
            title: Some(format!("Offer {}", id)),
            url: Some(format!("https://shop.example/{}", id)),
            price: Some(price.into()),
            original_price: Some((price * 2.0).into()),
            commission_rate: Some(Amount::from(8.0)),
            ..GenericOffer::default()
        })
    }

    #[tokio::test]
    async fn test_cycle_walks_states_back_to_idle() {
        let stats = Arc::new(MemoryStatsStore::new());
        let mut orchestrator = CycleOrchestrator::new(
            &Config::default(),
            vec![Arc::new(Fixed(vec![generic("a", 40.0), RawOffer::Generic(GenericOffer::default())]))],
            Arc::new(Sink),
            Arc::new(MemoryLedgerStore::new()),
            stats.clone(),
        );

        let record = orchestrator.run_cycle().await;

        assert_eq!(orchestrator.state(), CycleState::Idle);
        assert_eq!(record.cycle_number, 1);
        assert_eq!(record.offers_fetched, 2);
        assert_eq!(record.offers_normalized, 1);
        assert_eq!(record.normalization_failures, 1);
        assert_eq!(record.offers_selected, 1);
        assert_eq!(record.offers_published, 1);
        assert!(record.finished_at >= record.started_at);
        assert_eq!(stats.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_sources_completes_with_empty_selection() {
        let mut orchestrator = CycleOrchestrator::new(
            &Config::default(),
            Vec::new(),
            Arc::new(Sink),
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(MemoryStatsStore::new()),
        );

        let record = orchestrator.run_cycle().await;
        assert!(!record.is_aborted());
        assert_eq!(record.offers_selected, 0);
    }
}
