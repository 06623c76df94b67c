//! A store shared between threads.
//!
//! Reads load partitions into the read cache, so every store operation
//! needs exclusive access. [`SharedStore`] puts one [`Store`] behind a
//! `parking_lot::Mutex`; each method holds the lock for a single operation.
//! Reader threads such as uploaders use [`SharedStore::snapshot`] to copy a
//! range out instead of holding the lock while they work.

use std::ops::RangeBounds;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;
use crate::record::Record;
use crate::schema::Schema;
use crate::store::Store;

/// Cloneable, thread-safe handle to one [`Store`].
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
}

impl SharedStore {
    /// Wraps an open store.
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Opens a store and wraps it.
    ///
    /// # Errors
    ///
    /// Any error of [`Store::open`].
    pub fn open<P: AsRef<Path>>(root: P, schema: &'static Schema) -> Result<Self> {
        Store::open(root, schema).map(Self::new)
    }

    /// Locks the store for a sequence of operations.
    ///
    /// A [`RangeIter`](crate::query::RangeIter) obtained through the guard
    /// keeps the lock until it is dropped.
    pub fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock()
    }

    /// Returns a copy of the record with exactly this timestamp.
    ///
    /// # Errors
    ///
    /// Same as [`Store::get`].
    pub fn get(&self, idx: NaiveDateTime) -> Result<Record> {
        self.inner.lock().get(idx).cloned()
    }

    /// Stores `record` under `idx`.
    ///
    /// # Errors
    ///
    /// Same as [`Store::set`].
    pub fn set(&self, idx: NaiveDateTime, record: Record) -> Result<()> {
        self.inner.lock().set(idx, record)
    }

    /// Deletes the record with exactly this timestamp.
    ///
    /// # Errors
    ///
    /// Same as [`Store::delete`].
    pub fn delete(&self, idx: NaiveDateTime) -> Result<Record> {
        self.inner.lock().delete(idx)
    }

    /// Copies the records in `range` out of the store.
    ///
    /// # Errors
    ///
    /// Same as [`Store::snapshot`].
    pub fn snapshot<R>(&self, range: R) -> Result<Vec<Record>>
    where
        R: RangeBounds<NaiveDateTime>,
    {
        self.inner.lock().snapshot(range)
    }

    /// Same as [`Store::before`].
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn before(&self, idx: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        self.inner.lock().before(idx)
    }

    /// Same as [`Store::after`].
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn after(&self, idx: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        self.inner.lock().after(idx)
    }

    /// Same as [`Store::nearest`].
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn nearest(&self, idx: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        self.inner.lock().nearest(idx)
    }

    /// Writes both caches to disk.
    ///
    /// # Errors
    ///
    /// Same as [`Store::flush`].
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().flush()
    }
}
