use crate::fuzzy_matcher::FzfMatcher;
use crate::router::{route_for, Route};
use crate::storage::CommandRecord;
use crate::store_manager::HistoryStore;
use std::collections::BTreeMap;

pub const MAX_RECORDS: usize = 50;

/// Which outcomes a history view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HistoryFilter {
    #[default]
    All,
    Success,
    Error,
}

impl HistoryFilter {
    pub fn accepts(self, record: &CommandRecord) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Success => record.success,
            HistoryFilter::Error => !record.success,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub avg_processing_ms: Option<u64>,
    pub by_model: BTreeMap<String, usize>,
    pub by_route: BTreeMap<String, usize>,
}

impl HistoryStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 * 100.0 / self.total as f64
        }
    }
}

/// Ordered command history, most recent first, capped at [`MAX_RECORDS`].
/// Every mutation is mirrored into the [`HistoryStore`].
pub struct Ledger {
    records: Vec<CommandRecord>,
    store: HistoryStore,
}

impl Ledger {
    pub fn open(store: HistoryStore) -> Self {
        let mut records = store.load();
        records.truncate(MAX_RECORDS);
        Self { records, store }
    }

    pub fn append(&mut self, record: CommandRecord) {
        tracing::debug!(id = %record.id, success = record.success, "appending history record");
        self.records.insert(0, record);
        self.records.truncate(MAX_RECORDS);
        self.store.save(&self.records);
    }

    pub fn list_all(&self) -> &[CommandRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    pub fn latest(&self) -> Option<&CommandRecord> {
        self.records.first()
    }

    /// Lookup by full id or by a unique id prefix.
    pub fn get(&self, id: &str) -> Option<&CommandRecord> {
        if let Some(exact) = self.records.iter().find(|r| r.id == id) {
            return Some(exact);
        }
        let mut candidates = self.records.iter().filter(|r| r.id.starts_with(id));
        match (candidates.next(), candidates.next()) {
            (Some(only), None) if !id.is_empty() => Some(only),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.store.clear();
    }

    pub fn find_by_filter<P>(&self, predicate: P) -> Vec<&CommandRecord>
    where
        P: Fn(&CommandRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Status filter plus optional free-text query over command and result.
    /// With a query, the best matches come first.
    pub fn search(&self, filter: HistoryFilter, query: Option<&str>) -> Vec<&CommandRecord> {
        let candidates = self.find_by_filter(|r| filter.accepts(r));
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => candidates,
            Some(q) => {
                let items = candidates
                    .into_iter()
                    .map(|r| {
                        let text = format!("{} {}", r.command, r.result.as_deref().unwrap_or(""));
                        (r, text)
                    })
                    .collect();
                FzfMatcher::new().rank(q, items)
            }
        }
    }

    pub fn stats(&self) -> HistoryStats {
        let mut stats = HistoryStats {
            total: self.records.len(),
            ..HistoryStats::default()
        };
        let mut timed = 0u64;
        let mut total_ms = 0u64;

        for record in &self.records {
            if record.success {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
            if let Some(info) = &record.agent_info {
                *stats.by_model.entry(info.model.clone()).or_insert(0) += 1;
                timed += 1;
                total_ms += info.processing_time_ms;
            }
            let route: Route = route_for(&record.command);
            *stats.by_route.entry(route.to_string()).or_insert(0) += 1;
        }

        if timed > 0 {
            stats.avg_processing_ms = Some(total_ms / timed);
        }
        stats
    }
}
