//! Resolution state accumulated across passes
//!
//! One `ClosureState` exists per resolution. Every collection in it only
//! grows: packages are never removed from the working set and requester
//! sets are merged by union, never overwritten.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use depclose_core::{PackageKey, PackageRecord, Requirement};

use crate::capability::extract_requirements;
use crate::graph::ClosureGraph;

/// Requester names keyed by requirement or source name
pub type Attribution = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Default)]
pub struct ClosureState {
    /// Insertion-ordered working set; the first `scanned` entries have been
    /// through requirement extraction
    working_set: IndexMap<PackageKey, PackageRecord>,
    scanned: usize,
    /// Requirement -> packages declaring it
    requirements: Attribution,
    /// Requirements new or with new requesters since their last fold
    pending: BTreeSet<Requirement>,
    /// Source name -> packages that caused it to be pulled in
    resolved: Attribution,
    /// Requirement -> requesters, for requirements nothing provides
    unsatisfied: Attribution,
    graph: ClosureGraph,
}

impl ClosureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose resolved sources are pre-seeded from a prior closure
    pub fn with_resolved<S, R>(prior: impl IntoIterator<Item = (S, R)>) -> Self
    where
        S: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let mut state = Self::new();
        for (source, requesters) in prior {
            state
                .resolved
                .entry(source.into())
                .or_default()
                .extend(requesters.into_iter().map(Into::into));
        }
        state
    }

    /// Add a package to the working set; false when already present
    pub fn enqueue(&mut self, package: PackageRecord) -> bool {
        let key = package.key();
        if self.working_set.contains_key(&key) {
            return false;
        }
        self.working_set.insert(key, package);
        true
    }

    pub fn contains(&self, key: &PackageKey) -> bool {
        self.working_set.contains_key(key)
    }

    pub fn working_set_len(&self) -> usize {
        self.working_set.len()
    }

    /// Packages not yet scanned
    pub fn unscanned_len(&self) -> usize {
        self.working_set.len() - self.scanned
    }

    /// Extract requirements of every package present now but not yet
    /// scanned; packages enqueued afterwards wait for the next call.
    ///
    /// Returns the number of packages scanned.
    pub fn scan_unscanned(&mut self) -> usize {
        let end = self.working_set.len();
        let start = self.scanned;

        let batch: Vec<(String, Vec<Requirement>)> = self
            .working_set
            .values()
            .skip(start)
            .map(|package| (package.name.clone(), extract_requirements(package).to_vec()))
            .collect();

        for (requester, requirements) in batch {
            for requirement in requirements {
                self.attribute(&requester, requirement);
            }
        }

        self.scanned = end;
        end - start
    }

    /// Record that `requester` declared `requirement`
    pub fn attribute(&mut self, requester: &str, requirement: Requirement) {
        let requesters = self.requirements.entry(requirement.clone()).or_default();
        if requesters.insert(requester.to_string()) {
            self.pending.insert(requirement);
        }
    }

    /// Drain the requirements that need folding, in sorted order
    pub fn take_pending(&mut self) -> Vec<Requirement> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Current requesters of a requirement
    pub fn requesters(&self, requirement: &str) -> BTreeSet<String> {
        self.requirements
            .get(requirement)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_resolved(&self, source_name: &str) -> bool {
        self.resolved.contains_key(source_name)
    }

    /// Union requesters into a source's entry; true if the source is new
    pub fn merge_resolved(&mut self, source_name: &str, requesters: &BTreeSet<String>) -> bool {
        match self.resolved.get_mut(source_name) {
            Some(existing) => {
                existing.extend(requesters.iter().cloned());
                false
            }
            None => {
                self.resolved
                    .insert(source_name.to_string(), requesters.clone());
                true
            }
        }
    }

    /// Record a requirement that no package provides
    pub fn mark_unsatisfied(&mut self, requirement: &str, requesters: &BTreeSet<String>) {
        self.unsatisfied
            .entry(requirement.to_string())
            .or_default()
            .extend(requesters.iter().cloned());
    }

    pub fn resolved(&self) -> &Attribution {
        &self.resolved
    }

    pub fn resolved_len(&self) -> usize {
        self.resolved.len()
    }

    pub fn unsatisfied(&self) -> &Attribution {
        &self.unsatisfied
    }

    pub fn graph_mut(&mut self) -> &mut ClosureGraph {
        &mut self.graph
    }

    /// Consume the state, keeping the parts callers report on
    pub fn into_parts(self) -> (Attribution, Attribution, ClosureGraph) {
        (self.resolved, self.unsatisfied, self.graph)
    }
}
