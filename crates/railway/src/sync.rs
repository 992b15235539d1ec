//! Concurrency primitives for parallel calls: named barriers and the
//! directional mutex
//!
//! All lanes of one parallel call share a [`SyncRegistry`]. Waits are
//! cancellation-aware: when any lane fails it flips the shared cancel
//! flag and wakes every sleeper, so sibling lanes unwind with
//! [`EvalError::Cancelled`] instead of deadlocking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::EvalError;

/// Per-lane identity inside a parallel call.
#[derive(Clone)]
pub struct LaneCtx {
    /// This lane's index, 0-based (`TID`)
    pub tid: usize,
    /// The lane count (`#TID`)
    pub lanes: usize,
    /// Synchronisation shared by all lanes of the call
    pub sync: Arc<SyncRegistry>,
    /// Set when any lane fails; checked at every statement and wait
    pub cancel: Arc<AtomicBool>,
}

impl LaneCtx {
    /// Whether the parallel context has been torn down.
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Tear down the parallel context: flag siblings and wake sleepers.
    pub fn cancel_all(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.sync.wake_all();
    }
}

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

struct MutexState {
    /// Direction latched by the first entrant of the batch
    latched: Option<bool>,
    /// The TID allowed to enter next
    next: usize,
    /// Lanes that have passed in this batch
    passed: usize,
}

/// Named barriers and directional mutexes for one parallel call.
pub struct SyncRegistry {
    lanes: usize,
    barriers: Mutex<HashMap<String, BarrierState>>,
    barrier_cv: Condvar,
    mutexes: Mutex<HashMap<String, MutexState>>,
    mutex_cv: Condvar,
}

impl SyncRegistry {
    /// A registry for `lanes` lanes.
    pub fn new(lanes: usize) -> Arc<Self> {
        Arc::new(SyncRegistry {
            lanes,
            barriers: Mutex::new(HashMap::new()),
            barrier_cv: Condvar::new(),
            mutexes: Mutex::new(HashMap::new()),
            mutex_cv: Condvar::new(),
        })
    }

    /// Wake every lane blocked in this registry.
    pub fn wake_all(&self) {
        self.barrier_cv.notify_all();
        self.mutex_cv.notify_all();
    }

    /// Block until all lanes have arrived at the barrier `name`. A
    /// barrier is its own inverse, so direction plays no part.
    pub fn barrier(&self, name: &str, cancel: &AtomicBool) -> Result<(), EvalError> {
        let mut map = self.barriers.lock();
        let generation = {
            let state = map.entry(name.to_string()).or_default();
            let generation = state.generation;
            state.arrived += 1;
            if state.arrived == self.lanes {
                state.arrived = 0;
                state.generation += 1;
                self.barrier_cv.notify_all();
                return Ok(());
            }
            generation
        };
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(EvalError::Cancelled);
            }
            let released = map
                .get(name)
                .map(|s| s.generation != generation)
                .unwrap_or(true);
            if released {
                return Ok(());
            }
            self.barrier_cv.wait(&mut map);
        }
    }

    /// Enter the mutex `name`. The first entrant of a batch latches the
    /// time direction; lanes then pass one at a time in ascending TID
    /// order forwards, descending backwards. A lane arriving against the
    /// latched direction fails immediately.
    pub fn mutex_enter(
        &self,
        name: &str,
        tid: usize,
        backwards: bool,
        cancel: &AtomicBool,
    ) -> Result<(), EvalError> {
        let mut map = self.mutexes.lock();
        {
            let lanes = self.lanes;
            let state = map.entry(name.to_string()).or_insert(MutexState {
                latched: None,
                next: 0,
                passed: 0,
            });
            match state.latched {
                None => {
                    state.latched = Some(backwards);
                    state.next = if backwards { lanes - 1 } else { 0 };
                    state.passed = 0;
                    self.mutex_cv.notify_all();
                }
                Some(direction) if direction != backwards => {
                    return Err(EvalError::MutexDirection {
                        name: name.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(EvalError::Cancelled);
            }
            let my_turn = map.get(name).map(|s| s.next == tid).unwrap_or(false);
            if my_turn {
                return Ok(());
            }
            self.mutex_cv.wait(&mut map);
        }
    }

    /// Leave the mutex `name`, handing the turn to the next lane in the
    /// latched direction, or resetting the latch once every lane has
    /// passed.
    pub fn mutex_exit(&self, name: &str, backwards: bool) {
        let mut map = self.mutexes.lock();
        if let Some(state) = map.get_mut(name) {
            state.passed += 1;
            if state.passed == self.lanes {
                state.latched = None;
            } else if backwards {
                state.next = state.next.wrapping_sub(1);
            } else {
                state.next += 1;
            }
        }
        self.mutex_cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn barrier_releases_all_lanes_together() {
        let lanes = 4;
        let sync = SyncRegistry::new(lanes);
        let cancel = Arc::new(AtomicBool::new(false));
        let before = Arc::new(AtomicUsize::new(0));

        thread::scope(|s| {
            for _ in 0..lanes {
                let sync = Arc::clone(&sync);
                let cancel = Arc::clone(&cancel);
                let before = Arc::clone(&before);
                s.spawn(move || {
                    before.fetch_add(1, Ordering::SeqCst);
                    sync.barrier("b", &cancel).unwrap();
                    // everyone must have incremented before anyone is released
                    assert_eq!(before.load(Ordering::SeqCst), lanes);
                });
            }
        });
    }

    #[test]
    fn mutex_orders_lanes_by_tid() {
        let lanes = 4;
        let sync = SyncRegistry::new(lanes);
        let cancel = Arc::new(AtomicBool::new(false));
        let order = Arc::new(Mutex::new(Vec::new()));

        thread::scope(|s| {
            // spawn in reverse to make ordering do the work
            for tid in (0..lanes).rev() {
                let sync = Arc::clone(&sync);
                let cancel = Arc::clone(&cancel);
                let order = Arc::clone(&order);
                s.spawn(move || {
                    sync.mutex_enter("m", tid, false, &cancel).unwrap();
                    order.lock().push(tid);
                    sync.mutex_exit("m", false);
                });
            }
        });
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn mutex_orders_lanes_by_descending_tid_backwards() {
        let lanes = 4;
        let sync = SyncRegistry::new(lanes);
        let cancel = Arc::new(AtomicBool::new(false));
        let order = Arc::new(Mutex::new(Vec::new()));

        thread::scope(|s| {
            // spawn in ascending order to make the latch do the work
            for tid in 0..lanes {
                let sync = Arc::clone(&sync);
                let cancel = Arc::clone(&cancel);
                let order = Arc::clone(&order);
                s.spawn(move || {
                    sync.mutex_enter("m", tid, true, &cancel).unwrap();
                    order.lock().push(tid);
                    sync.mutex_exit("m", true);
                });
            }
        });
        assert_eq!(*order.lock(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn mutex_direction_conflict_is_an_error() {
        let sync = SyncRegistry::new(2);
        let cancel = AtomicBool::new(false);
        sync.mutex_enter("m", 0, false, &cancel).unwrap();
        let err = sync.mutex_enter("m", 1, true, &cancel).unwrap_err();
        assert_eq!(err, EvalError::MutexDirection { name: "m".into() });
    }

    #[test]
    fn cancellation_wakes_barrier_waiters() {
        let sync = SyncRegistry::new(2);
        let cancel = Arc::new(AtomicBool::new(false));

        thread::scope(|s| {
            let waiter_sync = Arc::clone(&sync);
            let waiter_cancel = Arc::clone(&cancel);
            let waiter = s.spawn(move || waiter_sync.barrier("b", &waiter_cancel));
            // let the waiter block, then cancel
            thread::sleep(std::time::Duration::from_millis(20));
            cancel.store(true, Ordering::Relaxed);
            sync.wake_all();
            assert_eq!(waiter.join().unwrap(), Err(EvalError::Cancelled));
        });
    }
}
