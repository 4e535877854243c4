//! Sorted entry collections and grouping indexes.

use super::Entry;
use crate::utils::text::clamp_range;
use std::{collections::BTreeMap, ops::Deref, sync::Arc};

// ============================================================================
// Entries
// ============================================================================

/// Entries ordered by descending `posted_at`.
#[derive(Debug, Clone, Default)]
pub struct Entries(Vec<Arc<Entry>>);

impl Entries {
    /// Sort newest first. Entries posted at the same instant keep their input order.
    pub fn sorted(mut entries: Vec<Arc<Entry>>) -> Self {
        entries.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Self(entries)
    }

    /// Sub-range `[i, j)` with negative-index wraparound; out of range clamps.
    ///
    /// `sub_list(-1, -1)` is the last entry, `sub_list(0, -1)` everything.
    pub fn sub_list(&self, i: i64, j: i64) -> &[Arc<Entry>] {
        &self.0[clamp_range(self.0.len(), i, j)]
    }
}

/// Entries already in collection order, such as a group or a page of one.
impl From<Vec<Arc<Entry>>> for Entries {
    fn from(entries: Vec<Arc<Entry>>) -> Self {
        Self(entries)
    }
}

impl Deref for Entries {
    type Target = [Arc<Entry>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// Grouping Index
// ============================================================================

/// Group key → entries sharing it, each group in collection order.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex(BTreeMap<String, Vec<Arc<Entry>>>);

impl GroupIndex {
    pub fn push(&mut self, key: impl Into<String>, entry: &Arc<Entry>) {
        self.0.entry(key.into()).or_default().push(Arc::clone(entry));
    }

    pub fn get(&self, key: &str) -> Option<&[Arc<Entry>]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Arc<Entry>])> {
        self.0.iter().map(|(key, entries)| (key.as_str(), entries.as_slice()))
    }

    /// Keys in ascending order, or descending when `reverse` is set.
    pub fn sorted_keys(&self, reverse: bool) -> Vec<&str> {
        let mut keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
        if reverse {
            keys.reverse();
        }
        keys
    }
}

// ============================================================================
// Content
// ============================================================================

/// Loaded entries plus their tag, year (`YYYY`) and month (`YYYYMM`) indexes.
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub entries: Entries,
    pub tags: GroupIndex,
    pub years: GroupIndex,
    pub months: GroupIndex,
}

impl Content {
    /// Sort `entries`, then index them in one pass over the sorted order.
    pub fn new(entries: Vec<Arc<Entry>>) -> Self {
        let entries = Entries::sorted(entries);
        let mut tags = GroupIndex::default();
        let mut years = GroupIndex::default();
        let mut months = GroupIndex::default();

        for entry in entries.iter() {
            for tag in &entry.tags {
                tags.push(tag.as_str(), entry);
            }
            let posted = &entry.posted_at;
            years.push(format!("{:04}", posted.year()), entry);
            months.push(format!("{:04}{:02}", posted.year(), posted.month()), entry);
        }

        Self {
            entries,
            tags,
            years,
            months,
        }
    }
}
