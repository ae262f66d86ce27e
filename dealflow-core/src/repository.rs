use async_trait::async_trait;
use dealflow_shared::{CycleRecord, LedgerEntry, StatsSummary};

use crate::error::{LedgerError, StatsError};

/// Durable backing of the dedup ledger.
///
/// Only the orchestrator writes through this; it loads the full ledger at the
/// start of a decision pass and upserts the entries the pass touched.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self) -> Result<Vec<LedgerEntry>, LedgerError>;

    async fn upsert(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError>;
}

/// Append-only sink of cycle records, readable by dashboards.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn append(&self, record: &CycleRecord) -> Result<(), StatsError>;

    /// Most recent records, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<CycleRecord>, StatsError>;

    async fn latest_cycle_number(&self) -> Result<Option<u64>, StatsError> {
        Ok(self.recent(1).await?.first().map(|r| r.cycle_number))
    }

    async fn summary(&self) -> Result<StatsSummary, StatsError> {
        let records = self.recent(usize::MAX).await?;
        Ok(StatsSummary::from_records(&records))
    }
}
