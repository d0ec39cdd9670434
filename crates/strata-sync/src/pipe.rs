use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use strata_types::normalize;
use tracing::trace;

/// Process-local per-name exclusive executor.
///
/// For a given name exactly one submitted action runs at a time. A
/// synchronization object is created lazily the first time a name is seen and
/// reused for every later caller naming it. The per-name lock is reentrant, so
/// an action may submit nested work under its own name from the same thread.
#[derive(Default)]
pub struct LocalPipe {
    slots: Mutex<HashMap<String, Arc<ReentrantMutex<()>>>>,
}

impl LocalPipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` exclusively with respect to every other action submitted
    /// under the same (canonical) name. Blocks until the current holder for
    /// that name finishes.
    pub fn run<T>(&self, name: &str, action: impl FnOnce() -> T) -> T {
        let slot = self.slot(name);
        let _turn = slot.lock();
        trace!(name, "pipe turn");
        action()
    }

    /// Number of distinct names seen so far.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    fn slot(&self, name: &str) -> Arc<ReentrantMutex<()>> {
        let mut slots = self.slots.lock();
        Arc::clone(
            slots
                .entry(normalize(name))
                .or_insert_with(|| Arc::new(ReentrantMutex::new(()))),
        )
    }
}

impl std::fmt::Debug for LocalPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPipe")
            .field("names", &self.len())
            .finish()
    }
}
