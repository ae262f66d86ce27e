use chrono::{DateTime, Duration, Utc};
use dealflow_shared::{Fingerprint, LedgerEntry, Offer};
use std::collections::{HashMap, HashSet};

/// In-memory view of the dedup ledger for one decision pass.
///
/// Loaded from a `LedgerStore`, mutated by the decision engine through
/// `&mut self` (so reads and writes are linearized by the borrow), then the
/// touched entries are handed back for persistence via [`DedupLedger::take_dirty`].
#[derive(Debug, Default, Clone)]
pub struct DedupLedger {
    entries: HashMap<Fingerprint, LedgerEntry>,
    category_last_selected: HashMap<String, DateTime<Utc>>,
    dirty: HashSet<Fingerprint>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let mut ledger = Self::new();
        for entry in entries {
            ledger.note_category(&entry.category, entry.last_selected_at);
            ledger.entries.insert(entry.fingerprint.clone(), entry);
        }
        ledger
    }

    /// True when the fingerprint was never selected, or its cooldown has fully elapsed.
    pub fn is_eligible(&self, fingerprint: &Fingerprint, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.entries.get(fingerprint) {
            None => true,
            Some(entry) => now - entry.last_selected_at >= cooldown,
        }
    }

    /// Upsert the entry for `offer`, bumping its selection count.
    pub fn record_selection(&mut self, offer: &Offer, now: DateTime<Utc>) -> &LedgerEntry {
        self.note_category(&offer.category, now);
        self.dirty.insert(offer.fingerprint.clone());
        let entry = self
            .entries
            .entry(offer.fingerprint.clone())
            .and_modify(|e| {
                e.last_selected_at = now;
                e.selection_count += 1;
                e.category = offer.category.clone();
            })
            .or_insert_with(|| LedgerEntry {
                fingerprint: offer.fingerprint.clone(),
                source_id: offer.source_id.clone(),
                category: offer.category.clone(),
                first_selected_at: now,
                last_selected_at: now,
                selection_count: 1,
            });
        entry
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&LedgerEntry> {
        self.entries.get(fingerprint)
    }

    /// Most recent selection time of any offer in `category`.
    pub fn category_last_selected(&self, category: &str) -> Option<DateTime<Utc>> {
        self.category_last_selected.get(category).copied()
    }

    /// Entries changed since load (or the previous call), for persistence.
    pub fn take_dirty(&mut self) -> Vec<LedgerEntry> {
        let mut out: Vec<LedgerEntry> = self
            .dirty
            .drain()
            .filter_map(|fp| self.entries.get(&fp).cloned())
            .collect();
        out.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn note_category(&mut self, category: &str, at: DateTime<Utc>) {
        let slot = self
            .category_last_selected
            .entry(category.to_string())
            .or_insert(at);
        if at > *slot {
            *slot = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: &str, category: &str) -> Offer {
        Offer::new("src", id, "t", "https://x", 20.0, 30.0, 6.0, Utc::now()).with_category(category)
    }

    #[test]
    fn test_cooldown_boundary() {
        let mut ledger = DedupLedger::new();
        let o = offer("a", "Kitchen");
        let t0 = Utc::now();
        let cooldown = Duration::hours(24);

        assert!(ledger.is_eligible(&o.fingerprint, t0, cooldown));
        ledger.record_selection(&o, t0);

        assert!(!ledger.is_eligible(&o.fingerprint, t0 + Duration::hours(23), cooldown));
        // exactly at the boundary the offer is eligible again
        assert!(ledger.is_eligible(&o.fingerprint, t0 + cooldown, cooldown));
    }

    #[test]
    fn test_reselection_increments_count() {
        let mut ledger = DedupLedger::new();
        let o = offer("a", "Kitchen");
        let t0 = Utc::now();

        ledger.record_selection(&o, t0);
        let entry = ledger.record_selection(&o, t0 + Duration::days(8)).clone();

        assert_eq!(entry.selection_count, 2);
        assert_eq!(entry.first_selected_at, t0);
        assert_eq!(entry.last_selected_at, t0 + Duration::days(8));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_dirty_entries_drain_once() {
        let t0 = Utc::now();
        let existing = LedgerEntry {
            fingerprint: offer("old", "Books").fingerprint,
            source_id: "src".into(),
            category: "Books".into(),
            first_selected_at: t0 - Duration::days(30),
            last_selected_at: t0 - Duration::days(30),
            selection_count: 1,
        };
        let mut ledger = DedupLedger::from_entries(vec![existing]);
        assert!(ledger.take_dirty().is_empty());

        ledger.record_selection(&offer("new", "Kitchen"), t0);
        let dirty = ledger.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].category, "Kitchen");
        assert!(ledger.take_dirty().is_empty());
    }

    #[test]
    fn test_category_recency_tracks_latest() {
        let t0 = Utc::now();
        let mut ledger = DedupLedger::new();
        assert_eq!(ledger.category_last_selected("Kitchen"), None);

        ledger.record_selection(&offer("a", "Kitchen"), t0);
        ledger.record_selection(&offer("b", "Kitchen"), t0 - Duration::hours(1));

        assert_eq!(ledger.category_last_selected("Kitchen"), Some(t0));
    }
}
