//! Transaction bookkeeping.
//!
//! A transaction defers propagation: input mutations inside the transaction
//! apply to the cells immediately, but the affected formulas only recompute
//! once, when the outermost transaction commits. The runtime holds one
//! depth counter and one [`PendingRound`] per graph.
//!
//! The same [`PendingRound`] structure carries the follow-up work queued by
//! callbacks that mutate inputs while a flush is executing.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::graph::CellId;
use crate::reactive::runtime::Shared;
use crate::value::Value;

/// Mutations accumulated for one propagation round.
///
/// Insertion order is preserved so flushes are deterministic.
#[derive(Debug, Default)]
pub(crate) struct PendingRound {
    /// Changed input cells, mapped to the value each held before its first
    /// change in this round. Watchers fire with that value as `old`, so
    /// repeated sets of one input coalesce into a single event.
    pub(crate) inputs: IndexMap<CellId, Value>,

    /// Formulas that must recompute regardless of upstream changes.
    pub(crate) forced: IndexSet<CellId>,
}

impl PendingRound {
    pub(crate) fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.forced.is_empty()
    }

    /// Record an input change. The first recorded old value wins.
    pub(crate) fn record_input(&mut self, id: CellId, old: &Value) {
        self.inputs.entry(id).or_insert_with(|| old.clone());
    }

    pub(crate) fn record_forced(&mut self, id: CellId) {
        self.forced.insert(id);
    }

    /// Fold another round into this one, preserving first-old-value wins.
    pub(crate) fn merge(&mut self, other: PendingRound) {
        for (id, old) in other.inputs {
            self.inputs.entry(id).or_insert(old);
        }
        self.forced.extend(other.forced);
    }

    pub(crate) fn take(&mut self) -> PendingRound {
        std::mem::take(self)
    }
}

/// Unwind guard for `Runtime::transaction`.
///
/// Forgotten on the normal path. If the transaction body panics, the guard
/// drops: the depth is released and the pending round is discarded, while
/// already-applied input values stay in place (no rollback).
pub(crate) struct TxGuard {
    pub(crate) shared: Arc<Shared>,
}

impl Drop for TxGuard {
    fn drop(&mut self) {
        let mut state = self.shared.state.write();
        state.depth = state.depth.saturating_sub(1);
        state.pending = PendingRound::default();
    }
}
