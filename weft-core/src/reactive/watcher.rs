//! Watcher registration.
//!
//! A watcher is a callback attached to a cell, invoked with the cell's
//! (old, new) values once per settled change. Registration returns a
//! [`WatchHandle`]; dropping the handle (or calling
//! [`WatchHandle::unsubscribe`]) removes the watcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::graph::CellId;
use crate::reactive::runtime::Shared;
use crate::value::Value;

/// Unique identifier for a watcher registration.
///
/// Uses an atomic counter to ensure uniqueness across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Watcher callback, invoked with (old, new).
///
/// Shared so a propagation round can invoke it with the store lock
/// released; watchers are therefore free to re-enter the runtime.
pub(crate) type WatcherFn = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Handle to a registered watcher.
///
/// Dropping the handle unregisters the watcher.
pub struct WatchHandle {
    pub(crate) cell: CellId,
    pub(crate) id: WatcherId,
    pub(crate) shared: Weak<Shared>,
}

impl WatchHandle {
    /// The cell this watcher is attached to.
    pub fn cell_id(&self) -> CellId {
        self.cell
    }

    /// Remove the watcher now instead of at drop time.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut state = shared.state.write();
            let record = state.store.get_mut(self.cell);
            record.watchers.retain(|(id, _)| *id != self.id);
        }
        self.shared = Weak::new();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_ids_are_unique() {
        let a = WatcherId::next();
        let b = WatcherId::next();
        let c = WatcherId::next();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
