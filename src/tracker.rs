// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bidirectional index from dependencies (Services) to the parents (Ingresses)
//! that must be reconciled again when a dependency changes.
//!
//! The index is in-memory only and is rebuilt by the first full reconciliation
//! pass after a restart.

use crate::key::ObjectKey;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Edges {
    /// dependency -> parents
    parents: HashMap<ObjectKey, BTreeSet<ObjectKey>>,
    /// parent -> dependencies
    dependencies: HashMap<ObjectKey, BTreeSet<ObjectKey>>,
}

/// Thread-safe dependency tracker. Both directions are updated under one lock,
/// so every forward edge always has its reverse edge.
#[derive(Debug, Default)]
pub struct Tracker {
    edges: Mutex<Edges>,
}

impl Tracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn edges(&self) -> MutexGuard<'_, Edges> {
        self.edges.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `parent` depends on `dependency`. Adding an existing edge is a no-op.
    pub fn track(&self, parent: &ObjectKey, dependency: &ObjectKey) {
        let mut edges = self.edges();
        edges
            .parents
            .entry(dependency.clone())
            .or_default()
            .insert(parent.clone());
        edges
            .dependencies
            .entry(parent.clone())
            .or_default()
            .insert(dependency.clone());
    }

    /// Remove every edge of `parent`. Unknown parents are ignored.
    pub fn untrack(&self, parent: &ObjectKey) {
        let mut edges = self.edges();
        let Some(dependencies) = edges.dependencies.remove(parent) else {
            return;
        };
        for dependency in dependencies {
            if let Some(parents) = edges.parents.get_mut(&dependency) {
                parents.remove(parent);
                if parents.is_empty() {
                    edges.parents.remove(&dependency);
                }
            }
        }
    }

    /// Parents depending on `dependency`, or `None` when nothing tracks it.
    #[must_use]
    pub fn lookup_parents(&self, dependency: &ObjectKey) -> Option<BTreeSet<ObjectKey>> {
        self.edges().parents.get(dependency).cloned()
    }

    /// Dependencies recorded for `parent`.
    #[must_use]
    pub fn dependencies_of(&self, parent: &ObjectKey) -> BTreeSet<ObjectKey> {
        self.edges()
            .dependencies
            .get(parent)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tracker_tests;
