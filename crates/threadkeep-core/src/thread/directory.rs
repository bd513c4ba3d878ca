//! The thread directory aggregate.
//!
//! `DirectoryState` is the single source of truth for which threads exist,
//! which one is the main thread and which are archived. It is a plain value:
//! the application layer clones it, applies a mutation, persists the clone and
//! only then swaps it in, so a failed write never leaves a half-applied change
//! behind.
//!
//! Invariants after every committed mutation:
//!
//! 1. `main_thread_id` has a record.
//! 2. `main_thread_id` is not archived.
//! 3. `regular_ids ∪ archived_ids ∪ {main_thread_id}` equals the record key set,
//!    and the two lists are disjoint.
//! 4. A record is `Archived` exactly when its id is in `archived_ids`.
//! 5. The visible ordering is the main id followed by the deduplicated regular
//!    ids, never repeating the main id.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use super::model::{DEFAULT_THREAD_ID, ThreadRecord, ThreadStatus};
use crate::error::{Result, ThreadkeepError};

const ENTITY: &str = "Thread";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryState {
    main_thread_id: String,
    regular_ids: Vec<String>,
    archived_ids: BTreeSet<String>,
    records: BTreeMap<String, ThreadRecord>,
}

impl Default for DirectoryState {
    /// A fresh directory containing only the default thread, which is main.
    fn default() -> Self {
        let mut records = BTreeMap::new();
        records.insert(DEFAULT_THREAD_ID.to_string(), ThreadRecord::default_thread());
        Self {
            main_thread_id: DEFAULT_THREAD_ID.to_string(),
            regular_ids: vec![DEFAULT_THREAD_ID.to_string()],
            archived_ids: BTreeSet::new(),
            records,
        }
    }
}

/// A single broken invariant found by [`DirectoryState::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The main id has no record.
    MainThreadMissing(String),
    /// The main id is in the archived set.
    MainThreadArchived(String),
    /// An id is listed but has no record.
    DanglingEntry(String),
    /// A record is in neither list and is not the main thread.
    UnlistedRecord(String),
    /// An id is both regular and archived.
    DuplicateMembership(String),
    /// Record status disagrees with list membership.
    StatusMismatch(String),
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainThreadMissing(id) => write!(f, "main thread '{id}' has no record"),
            Self::MainThreadArchived(id) => write!(f, "main thread '{id}' is archived"),
            Self::DanglingEntry(id) => write!(f, "thread '{id}' is listed without a record"),
            Self::UnlistedRecord(id) => write!(f, "thread '{id}' has a record but is not listed"),
            Self::DuplicateMembership(id) => {
                write!(f, "thread '{id}' is both regular and archived")
            }
            Self::StatusMismatch(id) => {
                write!(f, "thread '{id}' status disagrees with its list membership")
            }
        }
    }
}

/// What [`DirectoryState::repair`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Listed ids dropped because they had no record.
    pub dropped_entries: Vec<String>,
    /// Ids whose record status was re-aligned with their list.
    pub realigned: Vec<String>,
    /// Records that were missing from both lists and got re-listed.
    pub relisted: Vec<String>,
    /// Number of duplicate regular entries removed.
    pub deduplicated: usize,
    /// Previous main id when it had to fall back to the default thread.
    pub main_reset_from: Option<String>,
    /// True when the default record had to be synthesized.
    pub default_synthesized: bool,
    /// True when the main thread had to be taken out of the archive.
    pub main_unarchived: bool,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self == &RepairReport::default()
    }
}

/// Serializable read-only view of the directory, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    pub main_thread_id: String,
    pub thread_ids: Vec<String>,
    pub archived_thread_ids: Vec<String>,
    pub threads: Vec<ThreadRecord>,
    pub archived_threads: Vec<ThreadRecord>,
}

impl DirectoryState {
    /// Rebuilds a state from its persisted parts without validating it.
    ///
    /// Call [`repair`](Self::repair) afterwards to restore the invariants.
    pub fn from_parts(
        main_thread_id: String,
        regular_ids: Vec<String>,
        archived_ids: impl IntoIterator<Item = String>,
        records: impl IntoIterator<Item = ThreadRecord>,
    ) -> Self {
        Self {
            main_thread_id,
            regular_ids,
            archived_ids: archived_ids.into_iter().collect(),
            records: records
                .into_iter()
                .map(|record| (record.thread_id.clone(), record))
                .collect(),
        }
    }

    // ============================================================================
    // Queries
    // ============================================================================

    /// The stored main id, which may be dangling until [`repair`](Self::repair) runs.
    pub fn main_thread_id(&self) -> &str {
        &self.main_thread_id
    }

    /// Raw regular id list, possibly containing the main id and duplicates.
    pub fn regular_ids(&self) -> &[String] {
        &self.regular_ids
    }

    pub fn archived_ids(&self) -> &BTreeSet<String> {
        &self.archived_ids
    }

    pub fn records(&self) -> &BTreeMap<String, ThreadRecord> {
        &self.records
    }

    pub fn get(&self, thread_id: &str) -> Option<&ThreadRecord> {
        self.records.get(thread_id)
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.records.contains_key(thread_id)
    }

    pub fn is_archived(&self, thread_id: &str) -> bool {
        self.archived_ids.contains(thread_id)
    }

    /// Visible thread ordering: main first, then deduplicated regular ids
    /// excluding the main id and anything archived.
    pub fn thread_ids(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut ordered = vec![self.main_thread_id.clone()];
        seen.insert(self.main_thread_id.as_str());

        for id in &self.regular_ids {
            if self.archived_ids.contains(id) || !seen.insert(id.as_str()) {
                continue;
            }
            ordered.push(id.clone());
        }
        ordered
    }

    pub fn archived_thread_ids(&self) -> Vec<String> {
        self.archived_ids.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        let thread_ids = self.thread_ids();
        let archived_thread_ids = self.archived_thread_ids();
        let collect = |ids: &[String]| -> Vec<ThreadRecord> {
            ids.iter().filter_map(|id| self.records.get(id).cloned()).collect()
        };

        DirectorySnapshot {
            main_thread_id: self.main_thread_id.clone(),
            threads: collect(&thread_ids),
            archived_threads: collect(&archived_thread_ids),
            thread_ids,
            archived_thread_ids,
        }
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Creates a regular record for `thread_id` unless one exists.
    ///
    /// Returns `true` when a record was created.
    pub fn initialize(&mut self, thread_id: &str) -> bool {
        if self.records.contains_key(thread_id) {
            return false;
        }
        self.records
            .insert(thread_id.to_string(), ThreadRecord::new(thread_id));
        self.archived_ids.remove(thread_id);
        if !self.regular_ids.iter().any(|id| id == thread_id) {
            self.regular_ids.push(thread_id.to_string());
        }
        true
    }

    /// Makes `thread_id` the main thread. The thread must exist and must not
    /// be archived.
    pub fn set_main(&mut self, thread_id: &str) -> Result<()> {
        if !self.records.contains_key(thread_id) {
            return Err(ThreadkeepError::not_found(ENTITY, thread_id));
        }
        if self.archived_ids.contains(thread_id) {
            return Err(ThreadkeepError::invalid_operation(format!(
                "cannot make archived thread '{thread_id}' the main thread"
            )));
        }
        self.main_thread_id = thread_id.to_string();
        Ok(())
    }

    pub fn rename(&mut self, thread_id: &str, title: impl Into<String>) -> Result<()> {
        let record = self
            .records
            .get_mut(thread_id)
            .ok_or_else(|| ThreadkeepError::not_found(ENTITY, thread_id))?;
        record.title = title.into();
        Ok(())
    }

    /// Moves `thread_id` into the archive. Returns `false` if it already was.
    pub fn archive(&mut self, thread_id: &str) -> Result<bool> {
        if thread_id == self.main_thread_id {
            return Err(ThreadkeepError::invalid_operation(format!(
                "cannot archive the main thread '{thread_id}'"
            )));
        }
        let record = self
            .records
            .get_mut(thread_id)
            .ok_or_else(|| ThreadkeepError::not_found(ENTITY, thread_id))?;
        if record.status == ThreadStatus::Archived {
            return Ok(false);
        }

        record.status = ThreadStatus::Archived;
        self.regular_ids.retain(|id| id != thread_id);
        self.archived_ids.insert(thread_id.to_string());
        Ok(true)
    }

    /// Moves `thread_id` back to the end of the regular ordering. Returns
    /// `false` if it was not archived.
    pub fn unarchive(&mut self, thread_id: &str) -> Result<bool> {
        let record = self
            .records
            .get_mut(thread_id)
            .ok_or_else(|| ThreadkeepError::not_found(ENTITY, thread_id))?;
        if record.status != ThreadStatus::Archived {
            return Ok(false);
        }

        record.status = ThreadStatus::Regular;
        self.archived_ids.remove(thread_id);
        self.regular_ids.retain(|id| id != thread_id);
        self.regular_ids.push(thread_id.to_string());
        Ok(true)
    }

    /// Removes `thread_id` from every structure.
    ///
    /// Returns the removed record, or `None` if the id was unknown.
    pub fn remove(&mut self, thread_id: &str) -> Result<Option<ThreadRecord>> {
        if thread_id == self.main_thread_id {
            return Err(ThreadkeepError::invalid_operation(format!(
                "cannot delete the main thread '{thread_id}'"
            )));
        }
        let Some(record) = self.records.remove(thread_id) else {
            return Ok(None);
        };
        self.regular_ids.retain(|id| id != thread_id);
        self.archived_ids.remove(thread_id);
        Ok(Some(record))
    }

    /// Drops every trace of `thread_id`, including the main pointer, without
    /// precondition checks. Used when the id turned out to be inconsistent.
    ///
    /// Returns `true` if anything was removed.
    pub fn purge(&mut self, thread_id: &str) -> bool {
        let before = (self.regular_ids.len(), self.archived_ids.len(), self.records.len());
        self.regular_ids.retain(|id| id != thread_id);
        self.archived_ids.remove(thread_id);
        self.records.remove(thread_id);
        let mut changed =
            before != (self.regular_ids.len(), self.archived_ids.len(), self.records.len());

        if self.main_thread_id == thread_id {
            changed |= !self.repair().is_clean();
        }
        changed
    }

    /// Makes sure the default thread has a regular record and is listed.
    ///
    /// Returns `true` if anything had to change.
    pub fn ensure_default_thread(&mut self) -> bool {
        let mut changed = false;
        let record = self
            .records
            .entry(DEFAULT_THREAD_ID.to_string())
            .or_insert_with(|| {
                changed = true;
                ThreadRecord::default_thread()
            });
        if record.status != ThreadStatus::Regular {
            record.status = ThreadStatus::Regular;
            changed = true;
        }
        changed |= self.archived_ids.remove(DEFAULT_THREAD_ID);
        if !self.regular_ids.iter().any(|id| id == DEFAULT_THREAD_ID) {
            self.regular_ids.push(DEFAULT_THREAD_ID.to_string());
            changed = true;
        }
        changed
    }

    // ============================================================================
    // Validation and repair
    // ============================================================================

    /// Lists every broken invariant without changing anything.
    pub fn validate(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        if !self.records.contains_key(&self.main_thread_id) {
            violations.push(InvariantViolation::MainThreadMissing(
                self.main_thread_id.clone(),
            ));
        }
        if self.archived_ids.contains(&self.main_thread_id) {
            violations.push(InvariantViolation::MainThreadArchived(
                self.main_thread_id.clone(),
            ));
        }

        let regular: BTreeSet<&String> = self.regular_ids.iter().collect();
        for id in regular.iter().copied().chain(self.archived_ids.iter()) {
            if !self.records.contains_key(id) {
                violations.push(InvariantViolation::DanglingEntry(id.clone()));
            }
        }
        for id in &self.archived_ids {
            if regular.contains(id) {
                violations.push(InvariantViolation::DuplicateMembership(id.clone()));
            }
        }

        for (id, record) in &self.records {
            let listed_regular = regular.contains(id);
            let listed_archived = self.archived_ids.contains(id);
            if !listed_regular && !listed_archived && *id != self.main_thread_id {
                violations.push(InvariantViolation::UnlistedRecord(id.clone()));
            }
            if record.is_archived() != listed_archived {
                violations.push(InvariantViolation::StatusMismatch(id.clone()));
            }
        }

        violations
    }

    /// Restores every invariant in place and reports what changed.
    pub fn repair(&mut self) -> RepairReport {
        let mut report = RepairReport::default();

        // Keep the first occurrence of each regular id.
        let mut seen = HashSet::new();
        let before = self.regular_ids.len();
        self.regular_ids.retain(|id| seen.insert(id.clone()));
        report.deduplicated = before - self.regular_ids.len();

        // Listed ids need a record.
        let records = &self.records;
        let mut dropped = Vec::new();
        self.regular_ids.retain(|id| {
            let keep = records.contains_key(id);
            if !keep {
                dropped.push(id.clone());
            }
            keep
        });
        self.archived_ids.retain(|id| {
            let keep = records.contains_key(id);
            if !keep {
                dropped.push(id.clone());
            }
            keep
        });
        report.dropped_entries = dropped;

        // An id in both lists follows its record's status.
        let both: Vec<String> = self
            .regular_ids
            .iter()
            .filter(|id| self.archived_ids.contains(*id))
            .cloned()
            .collect();
        for id in both {
            let archived = self.records.get(&id).is_some_and(ThreadRecord::is_archived);
            if archived {
                self.regular_ids.retain(|other| *other != id);
            } else {
                self.archived_ids.remove(&id);
            }
        }

        // Status follows membership.
        for (id, record) in self.records.iter_mut() {
            let listed_archived = self.archived_ids.contains(id);
            let listed_regular = self.regular_ids.contains(id);
            if listed_archived && record.status != ThreadStatus::Archived {
                record.status = ThreadStatus::Archived;
                report.realigned.push(id.clone());
            } else if listed_regular && record.status != ThreadStatus::Regular {
                record.status = ThreadStatus::Regular;
                report.realigned.push(id.clone());
            } else if !listed_archived && !listed_regular {
                if record.is_archived() {
                    self.archived_ids.insert(id.clone());
                } else {
                    self.regular_ids.push(id.clone());
                }
                report.relisted.push(id.clone());
            }
        }

        // The main id must resolve; fall back to the default thread.
        if !self.records.contains_key(&self.main_thread_id) {
            report.main_reset_from = Some(std::mem::replace(
                &mut self.main_thread_id,
                DEFAULT_THREAD_ID.to_string(),
            ));
            if !self.records.contains_key(DEFAULT_THREAD_ID) {
                self.records
                    .insert(DEFAULT_THREAD_ID.to_string(), ThreadRecord::default_thread());
                report.default_synthesized = true;
            }
        }

        // The main thread is never archived and always listed.
        let main = self.main_thread_id.clone();
        if self.archived_ids.remove(&main) {
            report.main_unarchived = true;
        }
        if let Some(record) = self.records.get_mut(&main)
            && record.status != ThreadStatus::Regular
        {
            record.status = ThreadStatus::Regular;
            report.main_unarchived = true;
        }
        if !self.regular_ids.contains(&main) {
            self.regular_ids.push(main);
            if report.main_reset_from.is_none() && !report.main_unarchived {
                report.relisted.push(self.main_thread_id.clone());
            }
        }

        report
    }
}


#[cfg(test)]
#[path = "directory_property_test.rs"]
mod property_tests;
