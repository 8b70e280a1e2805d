//! Progress gate between the background loader and waiting callers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// Materialization progress of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotStarted,
    /// Breadth-first level `n` has been published.
    LevelLoading(usize),
    Ready,
    Failed,
    /// Loading stopped early; the tree is usable but incomplete.
    Cancelled,
}

#[derive(Debug)]
struct Inner {
    state: LoadState,
    error: Option<Arc<Error>>,
}

/// Monotonic node counter plus captured error, guarded by a condition
/// variable. Every update happens under the lock and wakes all waiters.
#[derive(Debug)]
pub struct LoadGate {
    inner: Mutex<Inner>,
    cond: Condvar,
    count: AtomicUsize,
}

impl Default for LoadGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LoadState::NotStarted,
                error: None,
            }),
            cond: Condvar::new(),
            count: AtomicUsize::new(0),
        }
    }

    /// Publish `count` nodes after finishing level `depth`.
    pub fn publish(&self, count: usize, depth: usize) {
        let mut inner = self.inner.lock();
        self.count.fetch_max(count, Ordering::Release);
        if matches!(inner.state, LoadState::NotStarted | LoadState::LevelLoading(_)) {
            inner.state = LoadState::LevelLoading(depth);
        }
        self.cond.notify_all();
    }

    /// Mark the walk complete, forcing the counter up to at least `target`
    /// so no waiter stays blocked.
    pub fn finish(&self, count: usize, target: usize) {
        let mut inner = self.inner.lock();
        self.count.fetch_max(count.max(target), Ordering::Release);
        inner.state = LoadState::Ready;
        self.cond.notify_all();
    }

    pub fn fail(&self, error: Error) {
        let mut inner = self.inner.lock();
        inner.state = LoadState::Failed;
        inner.error = Some(Arc::new(error));
        self.cond.notify_all();
    }

    pub fn cancelled(&self) {
        let mut inner = self.inner.lock();
        if inner.state != LoadState::Failed {
            inner.state = LoadState::Cancelled;
        }
        self.cond.notify_all();
    }

    /// Block until at least `min` nodes are published, the walk ends, or it
    /// fails. Returns the published count.
    pub fn wait_for(&self, min: usize) -> Result<usize> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(err) = &inner.error {
                return Err(Error::AsyncMaterializationFailed(Arc::clone(err)));
            }
            let count = self.count.load(Ordering::Acquire);
            if count >= min || matches!(inner.state, LoadState::Ready | LoadState::Cancelled) {
                return Ok(count);
            }
            self.cond.wait(&mut inner);
        }
    }

    pub fn state(&self) -> LoadState {
        self.inner.lock().state
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn counter_is_monotonic() {
        let gate = LoadGate::new();
        gate.publish(10, 1);
        gate.publish(4, 2);
        assert_eq!(gate.count(), 10);
        assert_eq!(gate.state(), LoadState::LevelLoading(2));
        gate.finish(10, 50);
        assert_eq!(gate.count(), 50);
        assert_eq!(gate.state(), LoadState::Ready);
    }

    #[test]
    fn waiter_released_by_publisher() {
        let gate = Arc::new(LoadGate::new());
        let g = Arc::clone(&gate);
        let producer = thread::spawn(move || {
            for i in 1..=5 {
                thread::sleep(Duration::from_millis(2));
                g.publish(i * 10, i);
            }
            g.finish(50, 0);
        });
        assert!(gate.wait_for(30).unwrap() >= 30);
        producer.join().unwrap();
        assert_eq!(gate.wait_for(1000).unwrap(), 50);
    }

    #[test]
    fn failure_reraised_to_every_waiter() {
        let gate = LoadGate::new();
        gate.publish(3, 1);
        gate.fail(Error::Unsupported("boom".into()));
        for _ in 0..2 {
            let err = gate.wait_for(1).unwrap_err();
            assert!(matches!(err, Error::AsyncMaterializationFailed(_)));
        }
        assert_eq!(gate.state(), LoadState::Failed);
    }

    #[test]
    fn cancellation_releases_waiter() {
        let gate = Arc::new(LoadGate::new());
        let g = Arc::clone(&gate);
        let t = thread::spawn(move || g.wait_for(usize::MAX));
        thread::sleep(Duration::from_millis(5));
        gate.cancelled();
        assert_eq!(t.join().unwrap().unwrap(), 0);
        assert_eq!(gate.state(), LoadState::Cancelled);
    }
}
