//! Cell Records
//!
//! This module defines the records that live in the cell arena.
//!
//! Cell identity is the arena index: cells are never destroyed, so an id
//! stays valid for the lifetime of the runtime that allocated it. Records
//! store both forward (dependency) and reverse (dependent) edges as index
//! lists to enable traversal in both directions without ownership cycles.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ComputeError;
use crate::reactive::watcher::{WatcherFn, WatcherId};
use crate::value::Value;

/// Unique identifier for a cell: its index in the arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellId(pub(crate) u32);

impl CellId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }

    /// Get the raw id value.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Public handle to a cell.
///
/// Handles are cheap to copy and only meaningful together with the
/// [`Runtime`](crate::reactive::Runtime) that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub(crate) id: CellId,
}

impl Cell {
    /// The cell's arena id.
    pub fn id(&self) -> CellId {
        self.id
    }
}

/// The kind of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// Holds an externally-set value. Roots of the graph; rank 0.
    Input,

    /// Derives its value from declared dependencies via an update function.
    Formula,
}

/// Update function of a formula cell.
///
/// Receives the current dependency values in declaration order.
pub(crate) type UpdateFn = Arc<dyn Fn(&[Value]) -> Result<Value, ComputeError> + Send + Sync>;

/// A record in the cell arena.
pub(crate) struct CellRecord {
    pub(crate) kind: CellKind,
    pub(crate) value: Value,

    /// Topological depth: 0 for inputs, 1 + max dependency rank for
    /// formulas. A dependency always has strictly lower rank than any cell
    /// depending on it.
    pub(crate) rank: u32,

    /// Ordered dependency list. Positional and may contain duplicates: the
    /// update function receives one value per entry.
    pub(crate) deps: SmallVec<[CellId; 4]>,

    /// Deduplicated reverse edges.
    pub(crate) dependents: Vec<CellId>,

    /// Present iff `kind == Formula`.
    pub(crate) update: Option<UpdateFn>,

    /// Set while a recomputation of this cell is outstanding.
    pub(crate) dirty: bool,

    pub(crate) watchers: Vec<(WatcherId, WatcherFn)>,
}

impl CellRecord {
    /// Create an input record holding `value`.
    pub(crate) fn input(value: Value) -> Self {
        Self {
            kind: CellKind::Input,
            value,
            rank: 0,
            deps: SmallVec::new(),
            dependents: Vec::new(),
            update: None,
            dirty: false,
            watchers: Vec::new(),
        }
    }

    /// Create a formula record with an already-computed initial value.
    pub(crate) fn formula(
        value: Value,
        deps: SmallVec<[CellId; 4]>,
        update: UpdateFn,
        rank: u32,
    ) -> Self {
        Self {
            kind: CellKind::Formula,
            value,
            rank,
            deps,
            dependents: Vec::new(),
            update: Some(update),
            dirty: false,
            watchers: Vec::new(),
        }
    }

    pub(crate) fn is_input(&self) -> bool {
        self.kind == CellKind::Input
    }

    pub(crate) fn is_formula(&self) -> bool {
        self.kind == CellKind::Formula
    }

    /// Add a reverse edge, ignoring duplicates.
    pub(crate) fn add_dependent(&mut self, id: CellId) {
        if !self.dependents.contains(&id) {
            self.dependents.push(id);
        }
    }

    pub(crate) fn remove_dependent(&mut self, id: CellId) {
        self.dependents.retain(|d| *d != id);
    }
}

impl fmt::Debug for CellRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellRecord")
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("rank", &self.rank)
            .field("deps", &self.deps)
            .field("dependents", &self.dependents)
            .field("dirty", &self.dirty)
            .field("watchers", &self.watchers.len())
            .finish()
    }
}
