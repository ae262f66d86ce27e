use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Why the decision engine refused an offer before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    PriceOutOfRange,
    CommissionTooLow,
    DiscountTooLow,
    QualityTooLow,
    MissingImage,
    CoolingDown,
    DuplicateInBatch,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::PriceOutOfRange => "price_out_of_range",
            RejectionReason::CommissionTooLow => "commission_too_low",
            RejectionReason::DiscountTooLow => "discount_too_low",
            RejectionReason::QualityTooLow => "quality_too_low",
            RejectionReason::MissingImage => "missing_image",
            RejectionReason::CoolingDown => "cooling_down",
            RejectionReason::DuplicateInBatch => "duplicate_in_batch",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceErrorKind {
    Transient,
    Fatal,
}

/// One failed source in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceErrorRecord {
    pub source_id: String,
    pub kind: SourceErrorKind,
    pub message: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleOutcome {
    Completed,
    Aborted { reason: String },
}

/// Result of one orchestrator run. Appended to the stats store once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle_id: Uuid,
    pub cycle_number: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub offers_fetched: usize,
    pub offers_normalized: usize,
    pub normalization_failures: usize,
    pub offers_selected: usize,
    pub offers_published: usize,
    pub publish_failures: usize,
    #[serde(default)]
    pub rejections: BTreeMap<String, usize>,
    #[serde(default)]
    pub errors: Vec<SourceErrorRecord>,
    pub outcome: CycleOutcome,
}

impl CycleRecord {
    pub fn new(cycle_number: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            cycle_number,
            started_at,
            finished_at: started_at,
            offers_fetched: 0,
            offers_normalized: 0,
            normalization_failures: 0,
            offers_selected: 0,
            offers_published: 0,
            publish_failures: 0,
            rejections: BTreeMap::new(),
            errors: Vec::new(),
            outcome: CycleOutcome::Completed,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Aborted { .. })
    }

    pub fn fatal_errors(&self) -> impl Iterator<Item = &SourceErrorRecord> {
        self.errors.iter().filter(|e| e.kind == SourceErrorKind::Fatal)
    }
}

/// Totals over a set of cycle records, for dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub cycles: usize,
    pub completed: usize,
    pub aborted: usize,
    pub offers_fetched: usize,
    pub offers_selected: usize,
    pub offers_published: usize,
    pub publish_failures: usize,
    pub transient_source_errors: usize,
    pub fatal_source_errors: usize,
    /// Selected / fetched over all cycles, 0 when nothing was fetched.
    pub selection_rate: f64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl StatsSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CycleRecord>) -> Self {
        let mut summary = StatsSummary::default();
        for record in records {
            summary.add(record);
        }
        summary
    }

    /// Fold one more record into the totals.
    pub fn add(&mut self, record: &CycleRecord) {
        self.cycles += 1;
        if record.is_aborted() {
            self.aborted += 1;
        } else {
            self.completed += 1;
        }
        self.offers_fetched += record.offers_fetched;
        self.offers_selected += record.offers_selected;
        self.offers_published += record.offers_published;
        self.publish_failures += record.publish_failures;
        for error in &record.errors {
            match error.kind {
                SourceErrorKind::Transient => self.transient_source_errors += 1,
                SourceErrorKind::Fatal => self.fatal_source_errors += 1,
            }
        }
        self.last_cycle_at = self.last_cycle_at.max(Some(record.started_at));
        self.selection_rate = Self::ratio(self.offers_selected, self.offers_fetched);
    }

    pub fn ratio(selected: usize, fetched: usize) -> f64 {
        if fetched == 0 {
            0.0
        } else {
            selected as f64 / fetched as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: u64, fetched: usize, selected: usize) -> CycleRecord {
        let mut r = CycleRecord::new(number, Utc::now());
        r.offers_fetched = fetched;
        r.offers_selected = selected;
        r
    }

    #[test]
    fn test_summary_totals() {
        let mut aborted = record(3, 5, 0);
        aborted.outcome = CycleOutcome::Aborted { reason: "ledger down".into() };
        aborted.errors.push(SourceErrorRecord {
            source_id: "cj".into(),
            kind: SourceErrorKind::Fatal,
            message: "401".into(),
            attempts: 1,
        });
        let records = vec![record(1, 10, 2), record(2, 10, 2), aborted];

        let summary = StatsSummary::from_records(&records);

        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.aborted, 1);
        assert_eq!(summary.offers_fetched, 25);
        assert_eq!(summary.fatal_source_errors, 1);
        assert!((summary.selection_rate - 4.0 / 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = StatsSummary::from_records(std::iter::empty());
        assert_eq!(summary, StatsSummary::default());
    }

    #[test]
    fn test_record_serializes_outcome_tag() {
        let r = record(7, 1, 1);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["outcome"]["status"], "COMPLETED");
        let back: CycleRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
