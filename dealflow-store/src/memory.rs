use async_trait::async_trait;
use dealflow_core::{LedgerError, LedgerStore, StatsError, StatsStore};
use dealflow_shared::{CycleRecord, Fingerprint, LedgerEntry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Process-local ledger store. Loses its contents on restart; meant for tests and dry runs.
pub struct MemoryLedgerStore {
    entries: RwLock<HashMap<Fingerprint, LedgerEntry>>,
    available: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|entry| (entry.fingerprint.clone(), entry))
            .collect();
        Self {
            entries: RwLock::new(map),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `LedgerError::Unavailable` until restored.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<LedgerEntry> {
        self.entries.read().await.get(fingerprint).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("memory ledger marked unavailable".into()))
        }
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.check_available()?;
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn upsert(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut map = self.entries.write().await;
        for entry in entries {
            map.insert(entry.fingerprint.clone(), entry.clone());
        }
        Ok(())
    }
}

/// Process-local cycle history.
#[derive(Default)]
pub struct MemoryStatsStore {
    records: RwLock<Vec<CycleRecord>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<CycleRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn append(&self, record: &CycleRecord) -> Result<(), StatsError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CycleRecord>, StatsError> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: &str) -> LedgerEntry {
        let now = Utc::now();
        LedgerEntry {
            fingerprint: Fingerprint::compute("test", id),
            source_id: "test".into(),
            category: "Kitchen".into(),
            first_selected_at: now,
            last_selected_at: now,
            selection_count: 1,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_fingerprint() {
        let store = MemoryLedgerStore::new();
        let mut e = entry("a");
        store.upsert(&[e.clone()]).await.unwrap();
        e.selection_count = 2;
        store.upsert(&[e.clone()]).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&e.fingerprint).await.unwrap().selection_count, 2);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryLedgerStore::with_entries(vec![entry("a")]);
        store.set_available(false);

        assert!(matches!(store.load().await, Err(LedgerError::Unavailable(_))));
        assert!(store.upsert(&[entry("b")]).await.is_err());

        store.set_available(true);
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_recent_is_newest_first() {
        let stats = MemoryStatsStore::new();
        for n in 1..=3 {
            stats.append(&CycleRecord::new(n, Utc::now())).await.unwrap();
        }

        let recent = stats.recent(2).await.unwrap();
        assert_eq!(recent.iter().map(|r| r.cycle_number).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(stats.latest_cycle_number().await.unwrap(), Some(3));
        assert_eq!(stats.summary().await.unwrap().cycles, 3);
    }
}
