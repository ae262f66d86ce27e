use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::offer::Fingerprint;

/// Selection history of one fingerprint. Created on first selection, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub fingerprint: Fingerprint,
    pub source_id: String,
    pub category: String,
    pub first_selected_at: DateTime<Utc>,
    pub last_selected_at: DateTime<Utc>,
    pub selection_count: u32,
}
