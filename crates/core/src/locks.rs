//! Path lock registry.
//!
//! One reentrant read/write lock per canonical path key. The registry map is only locked for
//! the lookup itself; waiting for a path happens on the path's own condition variable, so
//! different paths never block each other.
//!
//! Entries are held weakly. A lock stays alive while any handle or guard references it and is
//! dropped from the map by [`PathLockRegistry::prune`] once nothing does.

use crate::path::RepositoryPath;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: Option<ThreadId>,
    write_depth: usize,
}

/// Reentrant read/write lock for one logical path.
///
/// The write half is reentrant on the owning thread and the owning writer may also take read
/// guards. Upgrading a held read guard to a write guard is not supported and blocks.
pub struct PathLock {
    key: String,
    state: Mutex<LockState>,
    released: Condvar,
}

impl PathLock {
    fn new(key: String) -> Self {
        Self {
            key,
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Blocks until no other thread holds the write half.
    pub fn read(self: &Arc<Self>) -> PathReadGuard {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while state.writer.is_some_and(|owner| owner != me) {
            self.released.wait(&mut state);
        }
        state.readers += 1;
        drop(state);

        PathReadGuard {
            lock: Arc::clone(self),
            _not_send: PhantomData,
        }
    }

    /// Blocks until this thread is the only holder, or already owns the write half.
    pub fn write(self: &Arc<Self>) -> PathWriteGuard {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.writer {
                Some(owner) if owner == me => break,
                None if state.readers == 0 => {
                    state.writer = Some(me);
                    break;
                }
                _ => self.released.wait(&mut state),
            }
        }
        state.write_depth += 1;
        drop(state);

        tracing::trace!(key = %self.key, "path write lock acquired");
        PathWriteGuard {
            lock: Arc::clone(self),
            _not_send: PhantomData,
        }
    }

    /// Takes the write half without blocking.
    pub fn try_write(self: &Arc<Self>) -> Option<PathWriteGuard> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        match state.writer {
            Some(owner) if owner == me => {}
            None if state.readers == 0 => state.writer = Some(me),
            _ => return None,
        }
        state.write_depth += 1;
        Some(PathWriteGuard {
            lock: Arc::clone(self),
            _not_send: PhantomData,
        })
    }

    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    pub fn is_write_locked_by_current_thread(&self) -> bool {
        self.state.lock().writer == Some(thread::current().id())
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 {
            self.released.notify_all();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        state.write_depth = state.write_depth.saturating_sub(1);
        if state.write_depth == 0 {
            state.writer = None;
            self.released.notify_all();
            tracing::trace!(key = %self.key, "path write lock released");
        }
    }
}

impl fmt::Debug for PathLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PathLock")
            .field("key", &self.key)
            .field("readers", &state.readers)
            .field("write_depth", &state.write_depth)
            .finish()
    }
}

/// Shared hold on a [`PathLock`], released on drop. Must be dropped on the acquiring thread.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct PathReadGuard {
    lock: Arc<PathLock>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for PathReadGuard {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive hold on a [`PathLock`], released on drop. Must be dropped on the acquiring thread.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct PathWriteGuard {
    lock: Arc<PathLock>,
    _not_send: PhantomData<*const ()>,
}

impl PathWriteGuard {
    pub fn key(&self) -> &str {
        self.lock.key()
    }
}

impl Drop for PathWriteGuard {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

/// Keyed map of [`PathLock`]s.
///
/// Constructed once and shared by `Arc`. Lookups never perform I/O.
pub struct PathLockRegistry {
    locks: Mutex<HashMap<String, Weak<PathLock>>>,
    prune_threshold: usize,
}

impl PathLockRegistry {
    pub fn new(prune_threshold: usize) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            prune_threshold: prune_threshold.max(1),
        }
    }

    /// Lock for a repository path.
    pub fn lock(&self, path: &RepositoryPath) -> Arc<PathLock> {
        self.lock_key(&path.lock_key())
    }

    /// Lock for a canonical key. The same key always yields the same live lock.
    pub fn lock_key(&self, key: &str) -> Arc<PathLock> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(key).and_then(Weak::upgrade) {
            return lock;
        }

        if locks.len() >= self.prune_threshold {
            Self::prune_locked(&mut locks);
        }

        let lock = Arc::new(PathLock::new(key.to_owned()));
        locks.insert(key.to_owned(), Arc::downgrade(&lock));
        lock
    }

    /// Drops entries whose lock is no longer referenced. Returns how many were removed.
    pub fn prune(&self) -> usize {
        Self::prune_locked(&mut self.locks.lock())
    }

    fn prune_locked(locks: &mut HashMap<String, Weak<PathLock>>) -> usize {
        let before = locks.len();
        locks.retain(|_, lock| lock.strong_count() > 0);
        let removed = before - locks.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = locks.len(), "pruned path locks");
        }
        removed
    }

    /// Number of entries currently in the map, live or not yet pruned.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PathLockRegistry {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_LOCK_PRUNE_THRESHOLD)
    }
}

impl fmt::Debug for PathLockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathLockRegistry")
            .field("entries", &self.len())
            .field("prune_threshold", &self.prune_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_same_key_same_lock() {
        let registry = PathLockRegistry::new(16);
        let a = registry.lock_key("s/r/com/example/foo");
        let b = registry.lock_key("s/r/com/example/foo");
        let c = registry.lock_key("s/r/com/example/bar");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_write_is_reentrant() {
        let registry = PathLockRegistry::new(16);
        let lock = registry.lock_key("s/r/a");

        let outer = lock.write();
        let inner = lock.write();
        let read = lock.read();
        assert!(lock.is_write_locked_by_current_thread());

        drop(read);
        drop(inner);
        assert!(lock.is_write_locked());
        drop(outer);
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn test_writer_excludes_other_threads() {
        let registry = Arc::new(PathLockRegistry::new(16));
        let guard = registry.lock_key("s/r/a").write();

        let (tx, rx) = mpsc::channel();
        let worker = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let _guard = registry.lock_key("s/r/a").write();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn test_different_paths_do_not_block() {
        let registry = Arc::new(PathLockRegistry::new(16));
        let _guard = registry.lock_key("s/r/a").write();

        let other = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.lock_key("s/r/b").try_write().is_some())
        };
        assert!(other.join().unwrap());
    }

    #[test]
    fn test_readers_share_and_block_writer() {
        let registry = Arc::new(PathLockRegistry::new(16));
        let lock = registry.lock_key("s/r/a");
        let read = lock.read();

        let shared = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _read = lock.read();
                lock.try_write().is_none()
            })
        };
        assert!(shared.join().unwrap());

        drop(read);
        assert!(lock.try_write().is_some());
    }

    #[test]
    fn test_write_sections_serialize() {
        let registry = Arc::new(PathLockRegistry::new(16));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = registry.lock_key("s/r/shared").write();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prune_keeps_held_locks() {
        let registry = PathLockRegistry::new(2);
        let held = registry.lock_key("s/r/held").write();
        drop(registry.lock_key("s/r/dead"));
        assert_eq!(registry.len(), 2);

        // Crossing the threshold prunes the dead entry but not the held one.
        let third = registry.lock_key("s/r/third");
        assert_eq!(registry.len(), 2);
        assert!(registry.lock_key("s/r/held").is_write_locked());

        drop(held);
        drop(third);
        assert_eq!(registry.prune(), 2);
        assert!(registry.is_empty());
    }
}
