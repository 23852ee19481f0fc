//! Reactive Runtime
//!
//! The runtime is the central coordinator: it owns the cell store and
//! executes propagation rounds when inputs change.
//!
//! # How It Works
//!
//! 1. `input` and `formula` allocate cells in the arena. A formula declares
//!    its dependencies explicitly and computes its initial value eagerly.
//!
//! 2. `set` assigns an input cell. Outside a transaction this immediately
//!    runs a propagation round; inside one, the change is recorded and the
//!    round runs once at commit.
//!
//! 3. A round walks the transitive dependents of the changed cells in
//!    ascending rank order and recomputes each affected formula at most
//!    once, reading dependency values that already settled this round. A
//!    formula whose dependencies did not change value is skipped. This is
//!    what makes propagation glitch-free: a diamond dependency recomputes
//!    its join point once, with both branches settled.
//!
//! 4. As each cell's value changes, its watchers fire with (old, new)
//!    before the round moves on to the next cell.
//!
//! # Failure
//!
//! An update function returning an error freezes that cell and its
//! transitive dependents at their last good values for the round; the first
//! error is returned to the caller that triggered the round, and unrelated
//! subgraphs still settle.
//!
//! # Re-entrancy
//!
//! The store lock is never held while user code runs, so update functions
//! and watchers may call back into the runtime. A mutation made while a
//! flush is executing is applied immediately and queued for a follow-up
//! round; rounds repeat until the graph is quiescent, all before the
//! triggering call returns.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{ComputeError, FlowError};
use crate::graph::{Cell, CellId, CellKind, CellRecord, CellStore, UpdateFn};
use crate::reactive::transaction::{PendingRound, TxGuard};
use crate::reactive::watcher::{WatchHandle, WatcherFn, WatcherId};
use crate::value::Value;

/// Shared interior of a runtime. All mutation goes through the single
/// writer lock; it is released whenever user code is invoked.
pub(crate) struct Shared {
    pub(crate) state: RwLock<State>,
}

pub(crate) struct State {
    pub(crate) store: CellStore,

    /// Open transaction depth.
    pub(crate) depth: u32,

    /// Mutations deferred by open transactions.
    pub(crate) pending: PendingRound,

    /// Whether a flush is currently executing.
    pub(crate) flushing: bool,

    /// Mutations queued by callbacks during a flush.
    pub(crate) followup: PendingRound,
}

/// A reactive dataflow graph handle.
///
/// Cheap to clone; clones share the same graph. All operations are
/// serialized behind one writer lock, so a multi-threaded embedder gets the
/// same single-writer semantics as a single-threaded one.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) shared: Arc<Shared>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(State {
                    store: CellStore::new(),
                    depth: 0,
                    pending: PendingRound::default(),
                    flushing: false,
                    followup: PendingRound::default(),
                }),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Create an input cell holding `initial`.
    pub fn input(&self, initial: impl Into<Value>) -> Cell {
        let id = self
            .shared
            .state
            .write()
            .store
            .insert(CellRecord::input(initial.into()));
        trace!(cell = id.raw(), "created input cell");
        Cell { id }
    }

    /// Create a formula cell over the given dependencies.
    ///
    /// `update` receives the dependency values in declaration order
    /// (duplicates included, positionally). The initial value is computed
    /// eagerly; if that computation fails, no cell is created and the
    /// returned error carries the id the cell would have received.
    pub fn formula<F>(&self, deps: &[Cell], update: F) -> Result<Cell, FlowError>
    where
        F: Fn(&[Value]) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        let update: UpdateFn = Arc::new(update);
        let dep_ids: SmallVec<[CellId; 4]> = deps.iter().map(|c| c.id).collect();

        // A cell that does not exist yet cannot be depended upon, so the
        // requested edges cannot close a cycle; no check needed here.
        let (dep_values, rank, next_id) = {
            let state = self.shared.state.read();
            let values: Vec<Value> = dep_ids
                .iter()
                .map(|d| state.store.get(*d).value.clone())
                .collect();
            let rank = state.store.rank_for(&dep_ids);
            (values, rank, CellId::from_index(state.store.len()))
        };

        let initial = update(&dep_values).map_err(|source| FlowError::Compute {
            cell: next_id,
            source,
        })?;

        let id = {
            let mut state = self.shared.state.write();
            let id = state
                .store
                .insert(CellRecord::formula(initial, dep_ids, update, rank));
            state.store.wire(id);
            id
        };
        trace!(cell = id.raw(), rank, "created formula cell");
        Ok(Cell { id })
    }

    /// Atomically replace a formula cell's update function and dependency
    /// list, then schedule it for recomputation as if a dependency had just
    /// changed (deferred under an open transaction).
    pub fn set_formula<F>(&self, cell: Cell, deps: &[Cell], update: F) -> Result<(), FlowError>
    where
        F: Fn(&[Value]) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        let update: UpdateFn = Arc::new(update);
        let dep_ids: SmallVec<[CellId; 4]> = deps.iter().map(|c| c.id).collect();

        let round = {
            let mut state = self.shared.state.write();
            if !state.store.get(cell.id).is_formula() {
                return Err(FlowError::NotAFormula { cell: cell.id });
            }
            for dep in &dep_ids {
                if state.store.depends_on(*dep, cell.id) {
                    return Err(FlowError::Cycle { cell: cell.id });
                }
            }

            state.store.unwire(cell.id);
            {
                let record = state.store.get_mut(cell.id);
                record.deps = dep_ids;
                record.update = Some(update);
            }
            state.store.wire(cell.id);
            state.store.rerank(cell.id);
            trace!(cell = cell.id.raw(), "replaced formula");

            if state.depth > 0 {
                state.pending.record_forced(cell.id);
                return Ok(());
            }
            if state.flushing {
                state.followup.record_forced(cell.id);
                return Ok(());
            }
            let mut round = PendingRound::default();
            round.record_forced(cell.id);
            round
        };
        self.propagate(round)
    }

    /// Get a cell's current value.
    pub fn get(&self, cell: Cell) -> Value {
        self.shared.state.read().store.get(cell.id).value.clone()
    }

    /// Assign an input cell and propagate.
    ///
    /// The cell takes the value immediately even inside a transaction; only
    /// the propagation to formula cells is deferred. Assigning a value
    /// equal to the current one is a no-op.
    pub fn set(&self, cell: Cell, value: impl Into<Value>) -> Result<(), FlowError> {
        let value = value.into();
        let round = {
            let mut state = self.shared.state.write();
            {
                let record = state.store.get_mut(cell.id);
                if !record.is_input() {
                    return Err(FlowError::NotAnInput { cell: cell.id });
                }
                if record.value == value {
                    return Ok(());
                }
            }
            let old = {
                let record = state.store.get_mut(cell.id);
                std::mem::replace(&mut record.value, value)
            };

            if state.depth > 0 {
                state.pending.record_input(cell.id, &old);
                return Ok(());
            }
            if state.flushing {
                state.followup.record_input(cell.id, &old);
                return Ok(());
            }
            let mut round = PendingRound::default();
            round.record_input(cell.id, &old);
            round
        };
        self.propagate(round)
    }

    /// Read-modify-write an input cell.
    pub fn update<F>(&self, cell: Cell, f: F) -> Result<(), FlowError>
    where
        F: FnOnce(&Value) -> Value,
    {
        let new_value = {
            let state = self.shared.state.read();
            f(&state.store.get(cell.id).value)
        };
        self.set(cell, new_value)
    }

    /// Register a watcher on a cell.
    ///
    /// The callback fires with (old, new) once per settled change of the
    /// cell. The returned handle unsubscribes on drop.
    pub fn watch<F>(&self, cell: Cell, callback: F) -> WatchHandle
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let id = WatcherId::next();
        self.shared
            .state
            .write()
            .store
            .get_mut(cell.id)
            .watchers
            .push((id, Arc::new(callback)));
        WatchHandle {
            cell: cell.id,
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Run `body` with propagation deferred until it returns.
    ///
    /// Transactions nest: only the outermost commit flushes, and it flushes
    /// exactly once no matter how many mutations the body performed. If
    /// `body` panics, already-applied input values remain applied and the
    /// deferred propagation is discarded (no rollback).
    pub fn transaction<R>(&self, body: impl FnOnce() -> R) -> Result<R, FlowError> {
        {
            let mut state = self.shared.state.write();
            if state.depth == 0 {
                state.pending = PendingRound::default();
            }
            state.depth += 1;
        }

        let guard = TxGuard {
            shared: Arc::clone(&self.shared),
        };
        let out = body();
        std::mem::forget(guard);

        let round = {
            let mut state = self.shared.state.write();
            state.depth -= 1;
            if state.depth == 0 {
                state.pending.take()
            } else {
                PendingRound::default()
            }
        };
        if round.is_empty() {
            Ok(out)
        } else {
            debug!("committing transaction");
            self.propagate(round).map(|()| out)
        }
    }

    /// A cell's kind.
    pub fn kind(&self, cell: Cell) -> CellKind {
        self.shared.state.read().store.get(cell.id).kind
    }

    /// A cell's topological depth.
    pub fn rank(&self, cell: Cell) -> u32 {
        self.shared.state.read().store.get(cell.id).rank
    }

    /// Total number of cells in the graph.
    pub fn cell_count(&self) -> usize {
        self.shared.state.read().store.len()
    }

    /// Number of watchers registered on a cell.
    pub fn watcher_count(&self, cell: Cell) -> usize {
        self.shared.state.read().store.get(cell.id).watchers.len()
    }

    /// Run one flush: the given round plus any follow-up rounds queued by
    /// callbacks, until the graph is quiescent.
    pub(crate) fn propagate(&self, round: PendingRound) -> Result<(), FlowError> {
        {
            let mut state = self.shared.state.write();
            if state.flushing {
                // A commit issued from inside a callback folds into the
                // flush that is already running.
                state.followup.merge(round);
                return Ok(());
            }
            state.flushing = true;
        }

        // Clears the flushing flag even if a callback panics mid-round.
        struct FlushReset<'a>(&'a Shared);
        impl Drop for FlushReset<'_> {
            fn drop(&mut self) {
                self.0.state.write().flushing = false;
            }
        }
        let _reset = FlushReset(&self.shared);

        self.run_rounds(round)
    }

    fn run_rounds(&self, mut round: PendingRound) -> Result<(), FlowError> {
        let mut first_err = None;
        let mut pass = 0usize;
        loop {
            pass += 1;
            self.run_round(round, &mut first_err);
            round = self.shared.state.write().followup.take();
            if round.is_empty() {
                break;
            }
            trace!(pass, "callback mutations queued a follow-up round");
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Execute a single propagation round in rank order.
    fn run_round(&self, round: PendingRound, first_err: &mut Option<FlowError>) {
        let mut changed: HashSet<CellId> = HashSet::new();

        // Announce settled input changes first (inputs have rank 0).
        for (id, old) in &round.inputs {
            let (current, watchers) = {
                let state = self.shared.state.read();
                let record = state.store.get(*id);
                let watchers: Vec<WatcherFn> =
                    record.watchers.iter().map(|(_, f)| f.clone()).collect();
                (record.value.clone(), watchers)
            };
            // A transaction may have set the cell back to its original
            // value; that is not a change.
            if current == *old {
                continue;
            }
            changed.insert(*id);
            for watcher in &watchers {
                watcher(old, &current);
            }
        }

        let changed_roots: Vec<CellId> = changed.iter().copied().collect();
        let forced: Vec<CellId> = round.forced.iter().copied().collect();
        let schedule = {
            let mut state = self.shared.state.write();
            state.store.schedule(&changed_roots, &forced)
        };
        debug!(cells = schedule.len(), "propagation round scheduled");

        let mut poisoned: HashSet<CellId> = HashSet::new();
        for cell in schedule {
            let mut state = self.shared.state.write();
            let deps = state.store.get(cell).deps.clone();

            if deps.iter().any(|d| poisoned.contains(d)) {
                // Upstream failure: freeze at the last good value.
                poisoned.insert(cell);
                continue;
            }
            if !round.forced.contains(&cell) && !deps.iter().any(|d| changed.contains(d)) {
                // No dependency changed value this round.
                state.store.get_mut(cell).dirty = false;
                continue;
            }

            let Some(update) = state.store.get(cell).update.clone() else {
                continue;
            };
            let dep_values: Vec<Value> = deps
                .iter()
                .map(|d| state.store.get(*d).value.clone())
                .collect();
            let old = state.store.get(cell).value.clone();
            drop(state);

            match update(&dep_values) {
                Err(source) => {
                    trace!(cell = cell.raw(), %source, "update function failed");
                    poisoned.insert(cell);
                    if first_err.is_none() {
                        *first_err = Some(FlowError::Compute { cell, source });
                    }
                }
                Ok(new_value) => {
                    let watchers = {
                        let mut state = self.shared.state.write();
                        let record = state.store.get_mut(cell);
                        record.dirty = false;
                        if record.value == new_value {
                            None
                        } else {
                            record.value = new_value.clone();
                            let watchers: Vec<WatcherFn> =
                                record.watchers.iter().map(|(_, f)| f.clone()).collect();
                            Some(watchers)
                        }
                    };
                    if let Some(watchers) = watchers {
                        changed.insert(cell);
                        trace!(cell = cell.raw(), "cell settled");
                        for watcher in &watchers {
                            watcher(&old, &new_value);
                        }
                    }
                }
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("cell_count", &self.cell_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_set_and_get() {
        let rt = Runtime::new();
        let a = rt.input(Value::Int(1));

        assert_eq!(rt.get(a), Value::Int(1));
        assert_eq!(rt.kind(a), CellKind::Input);
        assert_eq!(rt.rank(a), 0);

        rt.set(a, Value::Int(2)).unwrap();
        assert_eq!(rt.get(a), Value::Int(2));
    }

    #[test]
    fn formula_computes_eagerly_and_tracks_chain() {
        let rt = Runtime::new();
        let a = rt.input(Value::Int(2));
        let b = rt
            .formula(&[a], |vals| {
                Ok(Value::Int(vals[0].as_int().unwrap_or(0) * 2))
            })
            .unwrap();
        let c = rt
            .formula(&[b], |vals| {
                Ok(Value::Int(vals[0].as_int().unwrap_or(0) + 1))
            })
            .unwrap();

        assert_eq!(rt.get(b), Value::Int(4));
        assert_eq!(rt.get(c), Value::Int(5));
        assert_eq!(rt.rank(c), 2);

        rt.set(a, Value::Int(10)).unwrap();
        assert_eq!(rt.get(b), Value::Int(20));
        assert_eq!(rt.get(c), Value::Int(21));
    }

    #[test]
    fn set_rejects_formula_cells() {
        let rt = Runtime::new();
        let a = rt.input(Value::Int(0));
        let b = rt.formula(&[a], |vals| Ok(vals[0].clone())).unwrap();

        let err = rt.set(b, Value::Int(1)).unwrap_err();
        assert!(matches!(err, FlowError::NotAnInput { .. }));
    }

    #[test]
    fn set_formula_rejects_input_cells() {
        let rt = Runtime::new();
        let a = rt.input(Value::Int(0));

        let err = rt.set_formula(a, &[], |_| Ok(Value::Nil)).unwrap_err();
        assert!(matches!(err, FlowError::NotAFormula { .. }));
    }

    #[test]
    fn update_reads_current_value() {
        let rt = Runtime::new();
        let a = rt.input(Value::Int(10));

        rt.update(a, |v| Value::Int(v.as_int().unwrap_or(0) + 5))
            .unwrap();
        assert_eq!(rt.get(a), Value::Int(15));
    }

    #[test]
    fn duplicate_dependencies_are_positional() {
        let rt = Runtime::new();
        let a = rt.input(Value::Int(3));
        let b = rt
            .formula(&[a, a], |vals| {
                Ok(Value::Int(
                    vals[0].as_int().unwrap_or(0) * vals[1].as_int().unwrap_or(0),
                ))
            })
            .unwrap();

        assert_eq!(rt.get(b), Value::Int(9));
        rt.set(a, Value::Int(4)).unwrap();
        assert_eq!(rt.get(b), Value::Int(16));
    }

    #[test]
    fn failing_eager_compute_creates_no_cell() {
        let rt = Runtime::new();
        let a = rt.input(Value::Int(0));
        let before = rt.cell_count();

        let err = rt
            .formula(&[a], |_| Err(ComputeError::new("nope")))
            .unwrap_err();
        assert!(matches!(err, FlowError::Compute { .. }));
        assert_eq!(rt.cell_count(), before);
    }
}
