use async_trait::async_trait;
use dealflow_core::{LedgerError, LedgerStore, StatsError, StatsStore};
use dealflow_shared::{CycleRecord, Fingerprint, LedgerEntry, StatsSummary};
use std::collections::{BTreeMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Ledger persisted as one JSON document, rewritten atomically on every upsert.
pub struct FileLedgerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<BTreeMap<Fingerprint, LedgerEntry>, LedgerError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(LedgerError::Unavailable(format!("{}: {}", self.path.display(), e))),
        };
        let entries: Vec<LedgerEntry> = serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::Corrupt(format!("{}: {}", self.path.display(), e)))?;
        Ok(entries.into_iter().map(|e| (e.fingerprint.clone(), e)).collect())
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn load(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.read_map().await?.into_values().collect())
    }

    async fn upsert(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        if entries.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        for entry in entries {
            map.insert(entry.fingerprint.clone(), entry.clone());
        }
        let all: Vec<&LedgerEntry> = map.values().collect();
        let json = serde_json::to_vec_pretty(&all)
            .map_err(|e| LedgerError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, &json)
            .await
            .map_err(|e| LedgerError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        info!("Ledger persisted: {} entries ({} updated)", map.len(), entries.len());
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await
}

/// Cycle records as JSON lines, one record per line, append-only.
pub struct JsonlStatsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Stream every readable record, oldest first, without holding the file in memory.
    async fn for_each_record(&self, mut visit: impl FnMut(CycleRecord)) -> Result<(), StatsError> {
        let file = match fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StatsError::Unavailable(format!("{}: {}", self.path.display(), e))),
        };
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0usize;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| StatsError::Unavailable(format!("{}: {}", self.path.display(), e)))?
        {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CycleRecord>(&line) {
                Ok(record) => visit(record),
                Err(e) => warn!("Skipping corrupt stats line {} in {}: {}", line_no, self.path.display(), e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StatsStore for JsonlStatsStore {
    async fn append(&self, record: &CycleRecord) -> Result<(), StatsError> {
        let mut line = serde_json::to_string(record).map_err(|e| StatsError::Corrupt(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StatsError::Unavailable(e.to_string()))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StatsError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StatsError::Unavailable(e.to_string()))?;
        file.flush().await.map_err(|e| StatsError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CycleRecord>, StatsError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut window: VecDeque<CycleRecord> = VecDeque::with_capacity(limit.min(1024));
        self.for_each_record(|record| {
            if window.len() == limit {
                window.pop_front();
            }
            window.push_back(record);
        })
        .await?;
        Ok(window.into_iter().rev().collect())
    }

    async fn summary(&self) -> Result<StatsSummary, StatsError> {
        let mut summary = StatsSummary::default();
        self.for_each_record(|record| summary.add(&record)).await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: &str, count: u32) -> LedgerEntry {
        let now = Utc::now();
        LedgerEntry {
            fingerprint: Fingerprint::compute("fixture", id),
            source_id: "fixture".into(),
            category: "Fitness".into(),
            first_selected_at: now,
            last_selected_at: now,
            selection_count: count,
        }
    }

    #[tokio::test]
    async fn test_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/ledger.json");

        let store = FileLedgerStore::new(&path);
        assert!(store.load().await.unwrap().is_empty());
        store.upsert(&[entry("a", 1), entry("b", 1)]).await.unwrap();
        store.upsert(&[entry("a", 2)]).await.unwrap();

        let reopened = FileLedgerStore::new(&path);
        let mut loaded = reopened.load().await.unwrap();
        loaded.sort_by_key(|e| e.selection_count);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].selection_count, 2);
    }

    #[tokio::test]
    async fn test_corrupt_ledger_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileLedgerStore::new(&path);
        assert!(matches!(store.load().await, Err(LedgerError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_jsonl_append_and_recent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycles.jsonl");
        let store = JsonlStatsStore::new(&path);

        for n in 1..=4 {
            store.append(&CycleRecord::new(n, Utc::now())).await.unwrap();
        }
        // a torn trailing write should not hide the good records
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"{\"cycle_num").unwrap();

        let recent = store.recent(3).await.unwrap();
        assert_eq!(recent.iter().map(|r| r.cycle_number).collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(store.latest_cycle_number().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_jsonl_summary_folds_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStatsStore::new(dir.path().join("cycles.jsonl"));
        assert_eq!(store.summary().await.unwrap(), StatsSummary::default());

        for n in 1..=3 {
            let mut record = CycleRecord::new(n, Utc::now());
            record.offers_fetched = 10;
            record.offers_selected = 1;
            store.append(&record).await.unwrap();
        }

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.offers_fetched, 30);
        assert!((summary.selection_rate - 0.1).abs() < 1e-9);
        assert_eq!(store.recent(0).await.unwrap().len(), 0);
    }
}
