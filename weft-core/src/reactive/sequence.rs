//! Sequence Reconciler
//!
//! Tracks a source cell whose value is an ordered sequence that may grow or
//! shrink between updates, and materializes one persistent input cell per
//! index ever observed.
//!
//! # Algorithm
//!
//! On each settled value of the source, with current length `n` and
//! high-water mark `m`:
//!
//! 1. Indices `[0, min(n, m))` update to the element at that index.
//! 2. Indices `[n, m)` (the sequence shrank) update to [`Value::Nil`].
//! 3. Indices `[m, n)` (new territory) each get a fresh input cell holding
//!    the element, the creation callback fires exactly once for it, and the
//!    high-water mark becomes `n`.
//!
//! Index-cells are never destroyed or recreated; only growth beyond the
//! historical maximum creates one. Retaining every index-cell ever observed
//! is the intended trade for stable identity, not an accident.
//!
//! A source value that is not a sequence reconciles as the empty sequence.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::graph::Cell;
use crate::reactive::runtime::{Runtime, Shared};
use crate::reactive::watcher::WatchHandle;
use crate::value::Value;

/// Creation callback, invoked once per index with its new cell.
type OnNewIndex = Box<dyn FnMut(usize, Cell) + Send>;

struct ReconcilerState {
    /// Weak so the graph does not keep itself alive through its own
    /// watcher list.
    shared: Weak<Shared>,
    /// One cell per index ever observed; `cells.len()` is the high-water
    /// mark.
    cells: Vec<Cell>,
    on_new_index: OnNewIndex,
}

impl ReconcilerState {
    fn reconcile(&mut self, value: &Value) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let runtime = Runtime::from_shared(shared);

        let items = value.as_seq().unwrap_or(&[]);
        let n = items.len();
        let m = self.cells.len();
        trace!(len = n, high_water = m, "reconciling sequence");

        for (i, item) in items.iter().enumerate().take(m) {
            if let Err(err) = runtime.set(self.cells[i], item.clone()) {
                warn!(index = i, %err, "index-cell update failed");
            }
        }
        for i in n..m {
            if let Err(err) = runtime.set(self.cells[i], Value::Nil) {
                warn!(index = i, %err, "index-cell update failed");
            }
        }
        for (i, item) in items.iter().enumerate().skip(m) {
            let cell = runtime.input(item.clone());
            self.cells.push(cell);
            (self.on_new_index)(i, cell);
        }
    }
}

/// Live reconciliation of a sequence-valued source cell.
///
/// Dropping the reconciler detaches it from the source; the index-cells it
/// created remain valid.
pub struct Reconciler {
    source: Cell,
    state: Arc<Mutex<ReconcilerState>>,
    _watch: WatchHandle,
}

impl Reconciler {
    /// The source cell being reconciled.
    pub fn source(&self) -> Cell {
        self.source
    }

    /// Highest sequence length ever observed.
    pub fn max_seen(&self) -> usize {
        self.state.lock().cells.len()
    }

    /// The index-cell for `index`, if that index has ever been observed.
    pub fn cell_at(&self, index: usize) -> Option<Cell> {
        self.state.lock().cells.get(index).copied()
    }

    /// Snapshot of all index-cells in index order.
    pub fn cells(&self) -> Vec<Cell> {
        self.state.lock().cells.clone()
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("source", &self.source)
            .field("max_seen", &self.max_seen())
            .finish()
    }
}

impl Runtime {
    /// Reconcile `source`'s sequence value into per-index cells.
    ///
    /// The current value is reconciled immediately, so a source already
    /// holding `k` elements fires `on_new_index` `k` times before this
    /// returns. Afterwards every settled change of `source` reconciles
    /// incrementally per the module algorithm.
    ///
    /// `on_new_index` must not call back into the returned reconciler.
    pub fn reconcile_sequence<F>(&self, source: Cell, on_new_index: F) -> Reconciler
    where
        F: FnMut(usize, Cell) + Send + 'static,
    {
        let state = Arc::new(Mutex::new(ReconcilerState {
            shared: Arc::downgrade(&self.shared),
            cells: Vec::new(),
            on_new_index: Box::new(on_new_index),
        }));

        state.lock().reconcile(&self.get(source));

        let watch_state = Arc::clone(&state);
        let watch = self.watch(source, move |_, new| {
            watch_state.lock().reconcile(new);
        });

        Reconciler {
            source,
            state,
            _watch: watch,
        }
    }
}
