//! Record wrappers serialized by a named mutex.
//!
//! The mutex of the record key is acquired by the first operation and held
//! across every later operation on the same wrapper, until [`release`] or
//! drop. Another wrapper on the same record, in this or any other process,
//! blocks in its first operation meanwhile.
//!
//! [`release`]: GuardedCell::release

use bytes::Bytes;
use parking_lot::Mutex;
use strata_doc::{Directive, Document};
use strata_sync::NamedMutex;
use strata_types::ResourceKey;

use crate::entity::{Cell, DocumentCell};
use crate::error::StrataResult;

/// Acquire-once holder shared by both wrappers.
struct Hold {
    mutex: NamedMutex,
    entry: Mutex<()>,
}

impl Hold {
    fn new(mutex: NamedMutex) -> Self {
        Self {
            mutex,
            entry: Mutex::new(()),
        }
    }

    fn ensure(&self) -> StrataResult<()> {
        let _entry = self.entry.lock();
        if !self.mutex.is_held() {
            self.mutex.acquire()?;
        }
        Ok(())
    }

    fn release(&self) -> StrataResult<()> {
        let _entry = self.entry.lock();
        Ok(self.mutex.release()?)
    }
}

/// A [`Cell`] held exclusively for the wrapper's lifetime.
pub struct GuardedCell {
    cell: Cell,
    hold: Hold,
}

impl GuardedCell {
    pub(crate) fn new(cell: Cell, mutex: NamedMutex) -> Self {
        Self {
            cell,
            hold: Hold::new(mutex),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        self.cell.key()
    }

    pub fn read(&self) -> StrataResult<Bytes> {
        self.hold.ensure()?;
        self.cell.read()
    }

    pub fn read_or(&self, default: impl Into<Bytes>) -> StrataResult<Bytes> {
        self.hold.ensure()?;
        self.cell.read_or(default)
    }

    pub fn read_string(&self) -> StrataResult<String> {
        self.hold.ensure()?;
        self.cell.read_string()
    }

    pub fn write(&self, data: impl AsRef<[u8]>) -> StrataResult<()> {
        self.hold.ensure()?;
        self.cell.write(data)
    }

    pub fn delete(&self) -> StrataResult<()> {
        self.hold.ensure()?;
        self.cell.delete()
    }

    /// Whether the wrapper currently holds the record's mutex.
    pub fn is_held(&self) -> bool {
        self.hold.mutex.is_held()
    }

    /// Release the mutex now. A later operation acquires it again.
    pub fn release(&self) -> StrataResult<()> {
        self.hold.release()
    }
}

/// A [`DocumentCell`] held exclusively for the wrapper's lifetime.
pub struct GuardedDocument {
    doc: DocumentCell,
    hold: Hold,
}

impl GuardedDocument {
    pub(crate) fn new(doc: DocumentCell, mutex: NamedMutex) -> Self {
        Self {
            doc,
            hold: Hold::new(mutex),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        self.doc.key()
    }

    pub fn read(&self) -> StrataResult<Document> {
        self.hold.ensure()?;
        self.doc.read()
    }

    pub fn read_or_else(&self, build: impl FnOnce() -> Document) -> StrataResult<Document> {
        self.hold.ensure()?;
        self.doc.read_or_else(build)
    }

    pub fn write(&self, doc: &Document) -> StrataResult<()> {
        self.hold.ensure()?;
        self.doc.write(doc)
    }

    pub fn delete(&self) -> StrataResult<()> {
        self.hold.ensure()?;
        self.doc.delete()
    }

    pub fn query(&self, path: &str) -> StrataResult<Vec<String>> {
        self.hold.ensure()?;
        self.doc.query(path)
    }

    /// Read, patch and write back as one exclusive step.
    pub fn patch(&self, directives: &[Directive]) -> StrataResult<usize> {
        self.hold.ensure()?;
        self.doc.patch(directives)
    }

    pub fn is_held(&self) -> bool {
        self.hold.mutex.is_held()
    }

    pub fn release(&self) -> StrataResult<()> {
        self.hold.release()
    }
}
