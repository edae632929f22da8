use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Selects which ledger entries a query returns, based on their processed flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentFilter {
    /// Only entries that have not been marked processed yet.
    #[default]
    ExcludeProcessed,
    /// Only entries that have been marked processed.
    OnlyProcessed,
    /// Every entry.
    All,
}

impl ContentFilter {
    fn accepts(self, entry: &LedgerEntry) -> bool {
        match self {
            ContentFilter::ExcludeProcessed => !entry.processed,
            ContentFilter::OnlyProcessed => entry.processed,
            ContentFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LedgerEntry {
    artifact: String,
    #[serde(default)]
    processed: bool,
}

/// Record of the artifacts produced by upstream pipeline stages, keyed by group.
///
/// Within a group an artifact appears at most once, in insertion order. Groups
/// iterate in sorted order. `Clone` produces a fully independent ledger: a
/// copy can be extended or marked processed without touching its source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLedger {
    groups: BTreeMap<String, Vec<LedgerEntry>>,
}

impl ContentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `artifact` under `group`.
    ///
    /// Returns `false` without touching the ledger when the group name is
    /// empty or the artifact is blank. Adding an artifact the group already
    /// holds is accepted but leaves the ledger unchanged.
    pub fn add(&mut self, group: &str, artifact: &str) -> bool {
        if group.is_empty() || artifact.trim().is_empty() {
            return false;
        }

        let entries = self.groups.entry(group.to_string()).or_default();
        if !entries.iter().any(|e| e.artifact == artifact) {
            entries.push(LedgerEntry {
                artifact: artifact.to_string(),
                processed: false,
            });
        }
        true
    }

    /// Applies [`add`](Self::add) to every artifact; blank ones are skipped.
    ///
    /// Returns `false` only when the group name itself is unusable.
    pub fn add_range<I, S>(&mut self, group: &str, artifacts: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if group.is_empty() {
            return false;
        }
        for artifact in artifacts {
            self.add(group, artifact.as_ref());
        }
        true
    }

    /// Every artifact recorded for `group`; empty for an unknown group.
    pub fn assets(&self, group: &str) -> Vec<&str> {
        self.assets_filtered(group, ContentFilter::All)
    }

    pub fn assets_filtered(&self, group: &str, filter: ContentFilter) -> Vec<&str> {
        self.groups
            .get(group)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| filter.accepts(e))
                    .map(|e| e.artifact.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Artifacts of every group, group by group.
    pub fn all_assets(&self, filter: ContentFilter) -> Vec<&str> {
        self.groups
            .values()
            .flatten()
            .filter(|e| filter.accepts(e))
            .map(|e| e.artifact.as_str())
            .collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn contains(&self, group: &str, artifact: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|entries| entries.iter().any(|e| e.artifact == artifact))
    }

    /// Total number of entries across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mark_all_processed(&mut self) {
        for entry in self.groups.values_mut().flatten() {
            entry.processed = true;
        }
    }

    /// Marks every entry for `artifact` processed, in whichever groups hold it.
    /// Returns `false` when no group knows the artifact.
    pub fn mark_processed(&mut self, artifact: &str) -> bool {
        let mut found = false;
        for entry in self.groups.values_mut().flatten() {
            if entry.artifact == artifact {
                entry.processed = true;
                found = true;
            }
        }
        found
    }

    pub fn unprocessed_count(&self) -> usize {
        self.groups
            .values()
            .flatten()
            .filter(|e| !e.processed)
            .count()
    }

    /// Number of entries per group, used for summaries.
    pub fn group_counts(&self) -> BTreeMap<String, usize> {
        self.groups
            .iter()
            .map(|(group, entries)| (group.clone(), entries.len()))
            .collect()
    }
}
