use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::digest::digest;
use crate::mutex::NamedMutex;
use crate::pipe::LocalPipe;

/// Owner of every lock-related table for one store instance.
///
/// The lock directory holds the OS lock files shared with other processes.
/// In-process slots make threads of this process exclude each other on the
/// same name, since advisory file locks are not guaranteed to do that on
/// every platform.
pub struct LockRegistry {
    lock_dir: PathBuf,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    pipe: LocalPipe,
    next_token: AtomicU64,
}

impl LockRegistry {
    /// Create a registry whose lock files live under `lock_dir`. The directory
    /// is created on first acquisition.
    pub fn new(lock_dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            lock_dir: lock_dir.into(),
            slots: Mutex::new(HashMap::new()),
            pipe: LocalPipe::new(),
            next_token: AtomicU64::new(1),
        })
    }

    /// A new handle on the machine-wide mutex for `name`.
    ///
    /// Handles are cheap; create one per logical operation.
    pub fn mutex(&self, name: &str) -> NamedMutex {
        let digest = digest(name);
        let path = self.lock_dir.join(format!("{digest}.lock"));
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(digest.clone()).or_insert_with(|| Arc::new(Slot::new())))
        };
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        NamedMutex::new(name, digest, path, slot, token)
    }

    /// The process-local serialization pipe owned by this registry.
    pub fn pipe(&self) -> &LocalPipe {
        &self.pipe
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }
}

impl std::fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRegistry")
            .field("lock_dir", &self.lock_dir)
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}

/// In-process ownership of one lock name. The owner is the token of the
/// handle currently holding the lock.
pub(crate) struct Slot {
    owner: Mutex<Option<u64>>,
    released: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    pub(crate) fn enter(&self, token: u64) {
        let mut owner = self.owner.lock();
        while owner.is_some() {
            self.released.wait(&mut owner);
        }
        *owner = Some(token);
    }

    /// Returns `false` if the deadline passed before the slot became free.
    pub(crate) fn enter_until(&self, token: u64, deadline: Instant) -> bool {
        let mut owner = self.owner.lock();
        while owner.is_some() {
            if self.released.wait_until(&mut owner, deadline).timed_out() && owner.is_some() {
                return false;
            }
        }
        *owner = Some(token);
        true
    }

    /// Leave the slot. On mismatch returns the actual owner.
    pub(crate) fn leave(&self, token: u64) -> Result<(), Option<u64>> {
        let mut owner = self.owner.lock();
        match *owner {
            Some(current) if current == token => {
                *owner = None;
                self.released.notify_one();
                Ok(())
            }
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn handles_for_one_name_share_a_slot_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LockRegistry::new(dir.path());
        let a = registry.mutex("Fleet/Catalog");
        let b = registry.mutex("fleet\\catalog");
        assert_eq!(a.lock_path(), b.lock_path());
        assert_eq!(registry.slots.lock().len(), 1);
        assert_ne!(a.token(), b.token());
    }

    #[test]
    fn registries_are_independent() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = LockRegistry::new(dir_a.path());
        let b = LockRegistry::new(dir_b.path());
        a.mutex("x");
        assert_eq!(a.slots.lock().len(), 1);
        assert_eq!(b.slots.lock().len(), 0);
    }

    #[test]
    fn slot_rejects_foreign_leave() {
        let slot = Slot::new();
        slot.enter(1);
        assert_eq!(slot.leave(2), Err(Some(1)));
        assert_eq!(slot.leave(1), Ok(()));
        assert_eq!(slot.leave(1), Err(None));
    }

    #[test]
    fn slot_enter_until_times_out() {
        let slot = Slot::new();
        slot.enter(1);
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!slot.enter_until(2, deadline));
        slot.leave(1).unwrap();
        assert!(slot.enter_until(2, Instant::now() + Duration::from_millis(20)));
    }
}
