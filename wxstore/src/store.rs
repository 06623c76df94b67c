//! Store module for the wxstore time-series storage engine.
//!
//! A [`Store`] is an ordered, disk-backed map from UTC timestamp to
//! [`Record`]. One store exists per [`Schema`]; the schema decides the record
//! shape and how timestamps are grouped into partition files.
//!
//! # Design
//!
//! - Partition files are plain text, one record per line (see [`codec`](crate::codec))
//! - Two caches are resident: a read cache for lookups and scans, and a
//!   write cache for point mutation
//! - Loading a partition into a cache flushes what it held before, or takes
//!   the partition over from the sibling cache if that already holds it
//! - `lo_limit`/`hi_limit` bound every record that may exist; they come from
//!   the first and last files on disk and widen whenever a load reaches past them
//!
//! # File Layout
//!
//! ```text
//! raw/                     <- store root
//! ├── 2024/
//! │   ├── 2024-05/
//! │   │   ├── 2024-05-30.txt
//! │   │   └── 2024-05-31.txt
//! │   └── 2024-06/
//! │       └── 2024-06-01.txt
//! └── ...
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use wxstore::schema::RAW;
//! use wxstore::{Record, Store};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = Store::open("./weather/raw", &RAW)?;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let idx = day.and_hms_opt(9, 0, 0).unwrap();
//! store.set(idx, Record::new(&RAW, idx).with("temp_out", 18.4)?)?;
//!
//! let start = day.and_hms_opt(0, 0, 0).unwrap();
//! for record in store.range(start..)? {
//!     let record = record?;
//!     println!("{} {:?}", record.idx(), record.get("temp_out"));
//! }
//!
//! store.flush()?;
//! # Ok(())
//! # }
//! ```

use std::cmp::{max, min};
use std::fs;
use std::io::ErrorKind;
use std::ops::{Bound, RangeBounds};
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::cache::Cache;
use crate::error::{LookupError, PartitionError, QueryError, RecordError, Result};
use crate::partition::{self, Partition, ScanOrder, end_of, midnight};
use crate::query::RangeIter;
use crate::record::{Record, whole_seconds};
use crate::schema::Schema;

/// Margin that keeps the initial, inverted bounds clear of the date extremes.
const EMPTY_MARGIN: Days = Days::new(500);

/// Selects one of the two resident caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Read,
    Write,
}

/// Disk-backed ordered store of one schema's records.
///
/// # Thread Safety
///
/// Every operation, reads included, may load a partition into a cache, so
/// all of them take `&mut self`. Use [`SharedStore`](crate::SharedStore) to
/// share a store across threads.
#[derive(Debug)]
pub struct Store {
    /// Store directory.
    root: PathBuf,
    /// Record shape and partition granularity.
    schema: &'static Schema,
    /// Cache used by lookups and scans.
    rd: Cache,
    /// Cache used by point mutation.
    wr: Cache,
    /// First date that may hold a record.
    lo_limit: NaiveDate,
    /// First date past every record.
    hi_limit: NaiveDate,
}

impl Store {
    /// Opens the store rooted at `root`, creating the directory if needed.
    ///
    /// The directory tree is scanned once for the first and last partition
    /// files, which set the initial bounds. An empty store starts with
    /// inverted bounds, so unbounded ranges over it are empty.
    ///
    /// # Errors
    ///
    /// [`PartitionError::DirectoryAccess`] if the directory cannot be created
    /// or scanned.
    pub fn open<P: AsRef<Path>>(root: P, schema: &'static Schema) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| PartitionError::DirectoryAccess {
            path: root.to_path_buf(),
            source: e,
        })?;
        let root = fs::canonicalize(root).map_err(|e| PartitionError::DirectoryAccess {
            path: root.to_path_buf(),
            source: e,
        })?;

        let (mut lo_limit, mut hi_limit) = empty_limits();
        if let Some(first) = partition::scan(&root, ScanOrder::First)? {
            lo_limit = Partition::select(&root, schema.granularity, first).lo;
        }
        if let Some(last) = partition::scan(&root, ScanOrder::Last)? {
            hi_limit = Partition::select(&root, schema.granularity, last).hi;
        }

        tracing::debug!(
            "opened {} store at {} with bounds [{lo_limit}, {hi_limit})",
            schema.name,
            root.display()
        );

        Ok(Self {
            root,
            schema,
            rd: Cache::new(),
            wr: Cache::new(),
            lo_limit,
            hi_limit,
        })
    }

    /// Returns the store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the store's schema.
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Returns the current `[lo_limit, hi_limit)` bounds.
    ///
    /// The bounds are conservative: no record lies outside them, but the
    /// partitions at either end may be empty. An `hi_limit` of
    /// `NaiveDate::MAX` also covers that last day.
    pub fn limits(&self) -> (NaiveDate, NaiveDate) {
        (self.lo_limit, self.hi_limit)
    }

    /// Returns the record with exactly this timestamp.
    ///
    /// Sub-second precision in `idx` is ignored, as it is for stored keys.
    ///
    /// # Errors
    ///
    /// - [`LookupError::NotFound`] if no record has this `idx`
    /// - any partition error raised while loading
    pub fn get(&mut self, idx: NaiveDateTime) -> Result<&Record> {
        let idx = whole_seconds(idx);
        self.ensure(Slot::Read, idx.date())?;
        match self.rd.get_ptr(idx) {
            (pos, true) => Ok(&self.rd.records()[pos]),
            (_, false) => Err(LookupError::NotFound { idx }.into()),
        }
    }

    /// Returns `true` if a record has exactly this timestamp.
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn contains(&mut self, idx: NaiveDateTime) -> Result<bool> {
        let idx = whole_seconds(idx);
        self.ensure(Slot::Read, idx.date())?;
        Ok(self.rd.get_ptr(idx).1)
    }

    /// Stores `record` under `idx`, replacing any record already there.
    ///
    /// The record's own `idx` is overwritten with `idx`, truncated to whole
    /// seconds. Keys that differ only below one second are the same key.
    ///
    /// # Errors
    ///
    /// - [`RecordError::SchemaMismatch`] if the record belongs to another schema
    /// - any partition error raised while loading
    pub fn set(&mut self, idx: NaiveDateTime, mut record: Record) -> Result<()> {
        if record.schema() != self.schema {
            return Err(RecordError::SchemaMismatch {
                expected: self.schema.name,
                found: record.schema().name,
            }
            .into());
        }
        self.ensure(Slot::Write, idx.date())?;
        record.set_idx(idx);
        self.wr.upsert(record);
        Ok(())
    }

    /// Stores each record under its own `idx`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first record that [`Store::set`] rejects. Earlier records
    /// stay stored.
    pub fn update<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.set(record.idx(), record)?;
        }
        Ok(())
    }

    /// Deletes and returns the record with exactly this timestamp.
    ///
    /// # Errors
    ///
    /// - [`LookupError::NotFound`] if no record has this `idx`
    /// - any partition error raised while loading
    pub fn delete(&mut self, idx: NaiveDateTime) -> Result<Record> {
        let idx = whole_seconds(idx);
        self.ensure(Slot::Write, idx.date())?;
        self.wr
            .remove(idx)
            .ok_or_else(|| LookupError::NotFound { idx }.into())
    }

    /// Returns a lazy, ascending sequence of the records in `range`.
    ///
    /// Only half-open ranges are supported: `..`, `a..`, `..b` and `a..b`.
    /// Bounds outside the store's limits are clamped to them, and a start
    /// past the end gives an empty sequence.
    ///
    /// The sequence borrows the store mutably, so the store cannot change
    /// while it is being consumed. Use [`Store::snapshot`] for an owned copy.
    ///
    /// # Errors
    ///
    /// - [`QueryError::InvalidSlice`] for an inclusive end or an excluded start
    /// - any partition error raised while loading the first partition
    pub fn range<R>(&mut self, range: R) -> Result<RangeIter<'_>>
    where
        R: RangeBounds<NaiveDateTime>,
    {
        let (start, end) = self.clamp(&range)?;
        RangeIter::new(self, start, end)
    }

    /// Returns every record in the store, oldest first.
    ///
    /// # Errors
    ///
    /// Same as [`Store::range`].
    pub fn iterate_all(&mut self) -> Result<RangeIter<'_>> {
        self.range(..)
    }

    /// Collects the records in `range` into an owned vector.
    ///
    /// # Errors
    ///
    /// Same as [`Store::range`], plus any partition error raised while
    /// crossing into a later partition.
    pub fn snapshot<R>(&mut self, range: R) -> Result<Vec<Record>>
    where
        R: RangeBounds<NaiveDateTime>,
    {
        self.range(range)?.collect()
    }

    /// Deletes every record in `range`.
    ///
    /// Partitions entirely inside the range are dropped from both caches and
    /// their files removed without being read. Partitions that straddle a
    /// bound are loaded and trimmed.
    ///
    /// # Errors
    ///
    /// - [`QueryError::InvalidSlice`] for an inclusive end or an excluded start
    /// - any partition error raised while loading, flushing or removing
    pub fn delete_range<R>(&mut self, range: R) -> Result<()>
    where
        R: RangeBounds<NaiveDateTime>,
    {
        let (start, end) = self.clamp(&range)?;
        if start >= end {
            return Ok(());
        }

        let mut day = start.date();
        loop {
            let partition = Partition::select(&self.root, self.schema.granularity, day);
            if partition.start() >= start && partition.end() <= end {
                self.evict(&partition)?;
            } else {
                self.ensure(Slot::Write, day)?;
                self.wr.remove_range(start..end);
            }
            if partition.end() >= end {
                return Ok(());
            }
            day = partition.hi;
        }
    }

    /// Returns the timestamp of the newest record strictly before `idx`.
    ///
    /// The search walks backwards across partitions until `lo_limit`.
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn before(&mut self, idx: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        let Some(last_day) = self.last_day() else {
            return Ok(None);
        };
        let mut day = min(idx.date(), last_day);
        while day >= self.lo_limit {
            self.ensure(Slot::Read, day)?;
            let (pos, _) = self.rd.get_ptr(idx);
            if pos > 0 {
                return Ok(Some(self.rd.records()[pos - 1].idx()));
            }
            match self.rd.partition().and_then(|p| p.lo.pred_opt()) {
                Some(prev) => day = prev,
                None => break,
            }
        }
        Ok(None)
    }

    /// Returns the timestamp of the oldest record at or after `idx`.
    ///
    /// The search walks forwards across partitions until `hi_limit`.
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn after(&mut self, idx: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        let mut day = max(idx.date(), self.lo_limit);
        while midnight(day) < self.limit_end() {
            self.ensure(Slot::Read, day)?;
            let (pos, _) = self.rd.get_ptr(idx);
            if let Some(record) = self.rd.records().get(pos) {
                return Ok(Some(record.idx()));
            }
            match self.rd.partition().map(|p| p.hi) {
                Some(next) if next > day => day = next,
                _ => break,
            }
        }
        Ok(None)
    }

    /// Returns the timestamp of the record closest to `idx`.
    ///
    /// An exact match wins outright. When the records on either side are
    /// equally far away, the earlier one is returned.
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn nearest(&mut self, idx: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        let hi = self.after(idx)?;
        if hi == Some(idx) {
            return Ok(hi);
        }
        let lo = self.before(idx)?;
        Ok(match (lo, hi) {
            (Some(lo), Some(hi)) if hi - idx < idx - lo => Some(hi),
            (Some(lo), _) => Some(lo),
            (None, hi) => hi,
        })
    }

    /// Returns the timestamp of the oldest record.
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn first(&mut self) -> Result<Option<NaiveDateTime>> {
        self.after(midnight(self.lo_limit))
    }

    /// Returns the timestamp of the newest record.
    ///
    /// # Errors
    ///
    /// Any partition error raised while loading.
    pub fn last(&mut self) -> Result<Option<NaiveDateTime>> {
        self.before(self.limit_end())
    }

    /// Writes both caches to disk.
    ///
    /// Must be called before the store is dropped for writes to be durable;
    /// the flush on drop is best effort.
    ///
    /// # Errors
    ///
    /// Any partition error raised while writing or removing a file.
    pub fn flush(&mut self) -> Result<()> {
        self.wr.flush()?;
        self.rd.flush()
    }

    /// Deletes every record and partition file of the store.
    ///
    /// Unflushed changes are discarded and the bounds reset to empty.
    ///
    /// # Errors
    ///
    /// - [`PartitionError::RemoveFailed`] if the directory cannot be removed
    /// - [`PartitionError::DirectoryAccess`] if it cannot be recreated
    pub fn clear(&mut self) -> Result<()> {
        self.rd.reset();
        self.wr.reset();
        (self.lo_limit, self.hi_limit) = empty_limits();

        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PartitionError::RemoveFailed {
                    path: self.root.clone(),
                    source: e,
                }
                .into());
            }
        }
        fs::create_dir_all(&self.root).map_err(|e| PartitionError::DirectoryAccess {
            path: self.root.clone(),
            source: e,
        })?;

        tracing::debug!("cleared {} store at {}", self.schema.name, self.root.display());
        Ok(())
    }

    /// Loads the partition covering `date` into one cache, if it is not
    /// already there, and widens the bounds to include it.
    pub(crate) fn ensure(&mut self, slot: Slot, date: NaiveDate) -> Result<()> {
        let (cache, sibling) = match slot {
            Slot::Read => (&mut self.rd, &mut self.wr),
            Slot::Write => (&mut self.wr, &mut self.rd),
        };
        if cache.covers(date) {
            return Ok(());
        }

        let partition = Partition::select(&self.root, self.schema.granularity, date);
        let (lo, hi) = (partition.lo, partition.hi);
        if sibling.holds(&partition) {
            cache.adopt(sibling)?;
        } else {
            cache.load(self.schema, partition)?;
        }

        self.lo_limit = min(self.lo_limit, lo);
        self.hi_limit = max(self.hi_limit, hi);
        Ok(())
    }

    /// Returns the first instant past the bounds.
    fn limit_end(&self) -> NaiveDateTime {
        end_of(self.hi_limit)
    }

    /// Returns the last date inside the bounds.
    fn last_day(&self) -> Option<NaiveDate> {
        if self.hi_limit == NaiveDate::MAX {
            Some(NaiveDate::MAX)
        } else {
            self.hi_limit.pred_opt()
        }
    }

    /// Returns the read cache.
    pub(crate) fn read_cache(&self) -> &Cache {
        &self.rd
    }

    /// Resolves a range request to clamped `[start, end)` timestamps.
    fn clamp<R>(&self, range: &R) -> Result<(NaiveDateTime, NaiveDateTime)>
    where
        R: RangeBounds<NaiveDateTime>,
    {
        let lo = midnight(self.lo_limit);
        let hi = self.limit_end();
        let start = match range.start_bound() {
            Bound::Included(a) => max(*a, lo),
            Bound::Unbounded => lo,
            Bound::Excluded(_) => {
                return Err(QueryError::InvalidSlice {
                    reason: "range start must be inclusive",
                }
                .into());
            }
        };
        let end = match range.end_bound() {
            Bound::Excluded(b) => min(*b, hi),
            Bound::Unbounded => hi,
            Bound::Included(_) => {
                return Err(QueryError::InvalidSlice {
                    reason: "range end must be exclusive",
                }
                .into());
            }
        };
        Ok((start, end))
    }

    /// Drops a partition from both caches and deletes its file.
    fn evict(&mut self, partition: &Partition) -> Result<()> {
        for cache in [&mut self.rd, &mut self.wr] {
            if cache.holds(partition) {
                cache.reset();
            }
        }
        match fs::remove_file(&partition.path) {
            Ok(()) => {
                tracing::debug!("evicted partition {}", partition.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PartitionError::RemoveFailed {
                path: partition.path.clone(),
                source: e,
            }
            .into()),
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(
                "failed to flush {} store at {} on drop: {e}",
                self.schema.name,
                self.root.display()
            );
        }
    }
}

/// Bounds of a store with no partition files.
///
/// `lo_limit` sits past `hi_limit`, so every clamped range is empty.
fn empty_limits() -> (NaiveDate, NaiveDate) {
    let lo = NaiveDate::MAX
        .checked_sub_days(EMPTY_MARGIN)
        .unwrap_or(NaiveDate::MAX);
    let hi = NaiveDate::MIN
        .checked_add_days(EMPTY_MARGIN)
        .unwrap_or(NaiveDate::MIN);
    (lo, hi)
}
