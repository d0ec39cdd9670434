use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt as _;
use parking_lot::Mutex;
use strata_types::normalize;
use tracing::{debug, error, warn};

use crate::error::{SyncError, SyncResult};
use crate::registry::Slot;

/// Poll interval for bounded acquisition of the OS lock.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Cross-process exclusive lock for one logical resource.
///
/// The OS-level primitive is an exclusive advisory lock on
/// `<lock_dir>/<digest>.lock`. While the lock is held the file carries an
/// owner marker; a clean release truncates it. A marker found at acquisition
/// time means the previous holder terminated without releasing, which is
/// reported as [`SyncError::Abandoned`].
///
/// A handle is meant for one logical operation: acquire once, release once.
/// Prefer [`NamedMutex::lock`], which releases on every exit path. Dropping a
/// handle that still holds the lock releases it.
pub struct NamedMutex {
    name: String,
    digest: String,
    path: PathBuf,
    slot: Arc<Slot>,
    token: u64,
    held: Mutex<Option<File>>,
}

impl NamedMutex {
    pub(crate) fn new(name: &str, digest: String, path: PathBuf, slot: Arc<Slot>, token: u64) -> Self {
        Self {
            name: normalize(name),
            digest,
            path,
            slot,
            token,
            held: Mutex::new(None),
        }
    }

    /// Block until the lock is owned by this handle.
    pub fn acquire(&self) -> SyncResult<()> {
        self.check_not_held()?;
        self.slot.enter(self.token);
        let file = match self.open_and_lock_blocking() {
            Ok(file) => file,
            Err(e) => {
                self.leave_slot();
                return Err(e);
            }
        };
        self.take_ownership(file)
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout` with
    /// [`SyncError::Timeout`].
    pub fn acquire_timeout(&self, timeout: Duration) -> SyncResult<()> {
        self.check_not_held()?;
        let deadline = Instant::now() + timeout;
        if !self.slot.enter_until(self.token, deadline) {
            return Err(self.timeout(timeout));
        }
        let file = match self.open_and_lock_until(deadline) {
            Ok(Some(file)) => file,
            Ok(None) => {
                self.leave_slot();
                return Err(self.timeout(timeout));
            }
            Err(e) => {
                self.leave_slot();
                return Err(e);
            }
        };
        self.take_ownership(file)
    }

    /// Release the lock. Releasing a handle that does not hold the lock is a
    /// silent no-op.
    pub fn release(&self) -> SyncResult<()> {
        let Some(file) = self.held.lock().take() else {
            return Ok(());
        };

        // Clear the owner marker before dropping the OS lock so the next
        // acquirer never mistakes a clean release for abandonment.
        let cleared = file.set_len(0).and_then(|()| file.sync_data());
        let unlocked = file.unlock();
        let left = self.slot.leave(self.token);
        debug!(name = %self.name, digest = %self.digest, "named mutex released");

        if let Err(owner) = left {
            error!(name = %self.name, ?owner, token = self.token, "released a slot owned by another handle");
            return Err(SyncError::Consistency {
                name: self.name.clone(),
                reason: format!("slot owned by {owner:?}, not by handle {}", self.token),
            });
        }
        cleared.map_err(|e| SyncError::io(&self.name, e))?;
        unlocked.map_err(|e| SyncError::io(&self.name, e))?;
        Ok(())
    }

    /// Acquire and return a guard that releases when dropped.
    pub fn lock(&self) -> SyncResult<NamedMutexGuard<'_>> {
        self.acquire()?;
        Ok(NamedMutexGuard {
            mutex: self,
            active: true,
        })
    }

    /// Run `f` while holding the lock.
    pub fn with<T>(&self, f: impl FnOnce() -> T) -> SyncResult<T> {
        let guard = self.lock()?;
        let value = f();
        guard.unlock()?;
        Ok(value)
    }

    /// Whether this handle currently owns the lock.
    pub fn is_held(&self) -> bool {
        self.held.lock().is_some()
    }

    /// Canonical logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Path of the OS lock file.
    pub fn lock_path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    fn check_not_held(&self) -> SyncResult<()> {
        if self.is_held() {
            return Err(SyncError::Consistency {
                name: self.name.clone(),
                reason: "handle already holds the lock".into(),
            });
        }
        Ok(())
    }

    fn open_lock_file(&self) -> SyncResult<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(&self.name, e))?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| SyncError::io(&self.name, e))
    }

    /// Open the lock file and block on the OS lock.
    fn open_and_lock_blocking(&self) -> SyncResult<File> {
        let file = self.open_lock_file()?;
        file.lock_exclusive().map_err(|e| SyncError::io(&self.name, e))?;
        Ok(file)
    }

    /// Open the lock file and poll the OS lock. Returns `Ok(None)` once
    /// `deadline` passes.
    fn open_and_lock_until(&self, deadline: Instant) -> SyncResult<Option<File>> {
        let file = self.open_lock_file()?;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Some(file)),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(SyncError::io(&self.name, e)),
            }
        }
    }

    /// With the OS lock taken: check for an abandoned marker, then write ours.
    fn take_ownership(&self, mut file: File) -> SyncResult<()> {
        let result = read_marker(&mut file).and_then(|previous| {
            if previous.is_empty() {
                write_marker(&mut file, self.token).map(|()| None)
            } else {
                file.set_len(0).and_then(|()| file.sync_data()).map(|()| Some(previous))
            }
        });

        match result {
            Ok(None) => {
                debug!(name = %self.name, digest = %self.digest, "named mutex acquired");
                *self.held.lock() = Some(file);
                Ok(())
            }
            Ok(Some(previous)) => {
                warn!(name = %self.name, %previous, "named mutex was abandoned");
                let _ = file.unlock();
                self.leave_slot();
                Err(SyncError::Abandoned {
                    name: self.name.clone(),
                    previous,
                })
            }
            Err(e) => {
                let _ = file.unlock();
                self.leave_slot();
                Err(SyncError::io(&self.name, e))
            }
        }
    }

    fn leave_slot(&self) {
        if let Err(owner) = self.slot.leave(self.token) {
            error!(name = %self.name, ?owner, token = self.token, "slot not owned by acquiring handle");
        }
    }

    fn timeout(&self, waited: Duration) -> SyncError {
        SyncError::Timeout {
            name: self.name.clone(),
            waited,
        }
    }
}

fn read_marker(file: &mut File) -> std::io::Result<String> {
    let mut marker = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut marker)?;
    Ok(marker.trim().to_string())
}

fn write_marker(file: &mut File, token: u64) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "pid:{} token:{token}", std::process::id())?;
    file.sync_data()
}

impl Drop for NamedMutex {
    fn drop(&mut self) {
        if self.is_held() {
            if let Err(e) = self.release() {
                error!(name = %self.name, error = %e, "failed to release named mutex on drop");
            }
        }
    }
}

impl std::fmt::Debug for NamedMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedMutex")
            .field("name", &self.name)
            .field("digest", &self.digest)
            .field("held", &self.is_held())
            .finish()
    }
}

/// Scoped ownership of a [`NamedMutex`]. Releases when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct NamedMutexGuard<'a> {
    mutex: &'a NamedMutex,
    active: bool,
}

impl NamedMutexGuard<'_> {
    /// Release now and report any failure, instead of logging it on drop.
    pub fn unlock(mut self) -> SyncResult<()> {
        self.active = false;
        self.mutex.release()
    }

    pub fn name(&self) -> &str {
        self.mutex.name()
    }
}

impl Drop for NamedMutexGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.mutex.release() {
                error!(name = %self.mutex.name(), error = %e, "failed to release named mutex guard");
            }
        }
    }
}
