use dealflow_shared::{CycleRecord, SourceErrorKind};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Prometheus counters for the orchestrator, kept in their own registry.
pub struct CycleMetrics {
    registry: Registry,
    cycles: IntCounterVec,
    offers_fetched: IntCounterVec,
    source_errors: IntCounterVec,
    offers_rejected: IntCounterVec,
    offers_selected: IntCounter,
    publish: IntCounterVec,
}

impl CycleMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles = IntCounterVec::new(
            Opts::new("dealflow_cycles_total", "Cycles run, by outcome"),
            &["outcome"],
        )?;
        let offers_fetched = IntCounterVec::new(
            Opts::new("dealflow_offers_fetched_total", "Raw offers fetched, by source"),
            &["source"],
        )?;
        let source_errors = IntCounterVec::new(
            Opts::new("dealflow_source_errors_total", "Source fetches that failed after retries"),
            &["source", "kind"],
        )?;
        let offers_rejected = IntCounterVec::new(
            Opts::new("dealflow_offers_rejected_total", "Offers rejected before scoring, by reason"),
            &["reason"],
        )?;
        let offers_selected = IntCounter::new("dealflow_offers_selected_total", "Offers selected for publishing")?;
        let publish = IntCounterVec::new(
            Opts::new("dealflow_publish_total", "Publish attempts, by result"),
            &["result"],
        )?;

        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(offers_fetched.clone()))?;
        registry.register(Box::new(source_errors.clone()))?;
        registry.register(Box::new(offers_rejected.clone()))?;
        registry.register(Box::new(offers_selected.clone()))?;
        registry.register(Box::new(publish.clone()))?;

        Ok(Self {
            registry,
            cycles,
            offers_fetched,
            source_errors,
            offers_rejected,
            offers_selected,
            publish,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_fetch(&self, source_id: &str, count: usize) {
        self.offers_fetched.with_label_values(&[source_id]).inc_by(count as u64);
    }

    /// Fold a finished cycle record into the counters.
    pub fn observe_cycle(&self, record: &CycleRecord) {
        let outcome = if record.is_aborted() { "aborted" } else { "completed" };
        self.cycles.with_label_values(&[outcome]).inc();

        for error in &record.errors {
            let kind = match error.kind {
                SourceErrorKind::Transient => "transient",
                SourceErrorKind::Fatal => "fatal",
            };
            self.source_errors.with_label_values(&[error.source_id.as_str(), kind]).inc();
        }
        for (reason, count) in &record.rejections {
            self.offers_rejected.with_label_values(&[reason.as_str()]).inc_by(*count as u64);
        }
        self.offers_selected.inc_by(record.offers_selected as u64);
        self.publish.with_label_values(&["success"]).inc_by(record.offers_published as u64);
        self.publish.with_label_values(&["failure"]).inc_by(record.publish_failures as u64);
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealflow_shared::{CycleOutcome, SourceErrorRecord};

    #[test]
    fn test_observe_and_render() {
        let metrics = CycleMetrics::new().unwrap();
        let mut record = CycleRecord::new(1, Utc::now());
        record.offers_selected = 2;
        record.offers_published = 1;
        record.publish_failures = 1;
        record.rejections.insert("cooling_down".into(), 3);
        record.errors.push(SourceErrorRecord {
            source_id: "cj".into(),
            kind: SourceErrorKind::Fatal,
            message: "401".into(),
            attempts: 1,
        });
        metrics.record_fetch("amazon", 12);
        metrics.observe_cycle(&record);

        record.outcome = CycleOutcome::Aborted { reason: "ledger".into() };
        metrics.observe_cycle(&record);

        let text = metrics.render().unwrap();
        assert!(text.contains("dealflow_cycles_total{outcome=\"completed\"} 1"));
        assert!(text.contains("dealflow_cycles_total{outcome=\"aborted\"} 1"));
        assert!(text.contains("dealflow_offers_fetched_total{source=\"amazon\"} 12"));
        assert!(text.contains("dealflow_offers_rejected_total{reason=\"cooling_down\"} 6"));
        assert!(text.contains("dealflow_offers_selected_total 4"));
    }
}
