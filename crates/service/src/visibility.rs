//! Per-item visibility tracking used to trigger prefetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct TrackState {
    index: usize,
    in_view: bool,
    reported: bool,
}

impl TrackState {
    fn reset(&mut self) {
        self.in_view = false;
        self.reported = false;
    }
}

type SharedState = Arc<Mutex<TrackState>>;

fn lock(state: &Mutex<TrackState>) -> MutexGuard<'_, TrackState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reset handles of every mounted tracker of one list.
#[derive(Debug, Default)]
pub struct TrackerRegistry {
    next_id: AtomicU64,
    trackers: Mutex<HashMap<u64, SharedState>>,
}

impl TrackerRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, SharedState>> {
        self.trackers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mounts a tracker for `index`. It stays registered until dropped.
    #[must_use]
    pub fn register(self: &Arc<Self>, index: usize) -> VisibilityTracker {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(Mutex::new(TrackState { index, ..TrackState::default() }));
        self.entries().insert(id, Arc::clone(&state));
        VisibilityTracker { id, state, registry: Arc::clone(self) }
    }

    /// Resets every mounted tracker. Returns how many were reset.
    pub fn reset_all(&self) -> usize {
        let entries = self.entries();
        for state in entries.values() {
            lock(state).reset();
        }
        entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn unregister(&self, id: u64) {
        self.entries().remove(&id);
    }
}

/// Observer owned by one rendered item.
///
/// Reports its index once per transition into view. Further reports are
/// suppressed until the item leaves view or the tracker is reset.
#[derive(Debug)]
pub struct VisibilityTracker {
    id: u64,
    state: SharedState,
    registry: Arc<TrackerRegistry>,
}

impl VisibilityTracker {
    #[must_use]
    pub fn index(&self) -> usize {
        lock(&self.state).index
    }

    /// Retargets the tracker without remounting it.
    pub fn set_index(&self, index: usize) {
        lock(&self.state).index = index;
    }

    /// Feeds a visibility change. Returns the index when the item has just
    /// entered view and has not been reported yet.
    pub fn observe(&self, visible: bool) -> Option<usize> {
        let mut state = lock(&self.state);
        if !visible {
            state.in_view = false;
            state.reported = false;
            return None;
        }
        let entered = !state.in_view;
        state.in_view = true;
        if entered && !state.reported {
            state.reported = true;
            Some(state.index)
        } else {
            None
        }
    }

    /// Clears the reported state so the item can trigger again.
    pub fn reset(&self) {
        lock(&self.state).reset();
    }
}

impl Drop for VisibilityTracker {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
