use async_trait::async_trait;
use dealflow_core::{LedgerError, LedgerStore};
use dealflow_shared::LedgerEntry;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::info;

/// Ledger kept in one Redis hash: field = fingerprint, value = JSON entry.
#[derive(Clone)]
pub struct RedisLedgerStore {
    client: redis::Client,
    key: String,
}

impl RedisLedgerStore {
    pub fn new(connection_string: &str, key_prefix: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            key: entries_key(key_prefix),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, LedgerError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }
}

fn entries_key(prefix: &str) -> String {
    format!("{}:entries", prefix.trim_end_matches(':'))
}

fn unavailable(e: redis::RedisError) -> LedgerError {
    LedgerError::Unavailable(format!("redis: {}", e))
}

/// Any undecodable field fails the whole load.
fn decode_entries(raw: HashMap<String, String>) -> Result<Vec<LedgerEntry>, LedgerError> {
    raw.into_iter()
        .map(|(field, value)| {
            serde_json::from_str::<LedgerEntry>(&value)
                .map_err(|e| LedgerError::Corrupt(format!("ledger entry {}: {}", field, e)))
        })
        .collect()
}

#[async_trait]
impl LedgerStore for RedisLedgerStore {
    async fn load(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut conn = self.connection().await?;
        let raw: HashMap<String, String> = conn.hgetall(&self.key).await.map_err(unavailable)?;
        decode_entries(raw)
    }

    async fn upsert(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut fields = Vec::with_capacity(entries.len());
        for entry in entries {
            let json = serde_json::to_string(entry).map_err(|e| LedgerError::Corrupt(e.to_string()))?;
            fields.push((entry.fingerprint.to_string(), json));
        }

        let mut conn = self.connection().await?;
        // MULTI/EXEC so a cycle's selections land together or not at all
        redis::pipe()
            .atomic()
            .hset_multiple(&self.key, &fields)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(unavailable)?;
        info!("Ledger upserted {} entries into {}", entries.len(), self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealflow_shared::Fingerprint;

    #[test]
    fn test_entries_key() {
        assert_eq!(entries_key("dealflow:ledger"), "dealflow:ledger:entries");
        assert_eq!(entries_key("dealflow:ledger:"), "dealflow:ledger:entries");
    }

    fn entry() -> LedgerEntry {
        let now = Utc::now();
        LedgerEntry {
            fingerprint: Fingerprint::compute("amazon", "B01"),
            source_id: "amazon".into(),
            category: "Electronics".into(),
            first_selected_at: now,
            last_selected_at: now,
            selection_count: 3,
        }
    }

    #[test]
    fn test_decode_entries() {
        let entry = entry();
        let mut raw = HashMap::new();
        raw.insert(entry.fingerprint.to_string(), serde_json::to_string(&entry).unwrap());

        assert_eq!(decode_entries(raw).unwrap(), vec![entry]);
    }

    #[test]
    fn test_truncated_entry_fails_the_load() {
        let entry = entry();
        let json = serde_json::to_string(&entry).unwrap();
        let mut raw = HashMap::new();
        raw.insert(entry.fingerprint.to_string(), json[..json.len() / 2].to_string());

        let err = decode_entries(raw).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt(_)));
    }
}
