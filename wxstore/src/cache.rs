//! In-memory materialization of one partition.
//!
//! A [`Cache`] holds every record of a single partition file, sorted by
//! `idx` with no duplicates, plus a dirty flag that is set exactly when the
//! in-memory records differ from the file. A [`Store`](crate::Store) owns
//! two caches, so at most two partitions are resident at any time.
//!
//! Swapping a cache to a different partition always flushes it first; no
//! write is lost by an eviction.

use std::fs;
use std::io::ErrorKind;
use std::mem;
use std::ops::Range;

use chrono::{NaiveDate, NaiveDateTime};

use crate::codec;
use crate::error::{PartitionError, Result};
use crate::partition::Partition;
use crate::record::Record;
use crate::schema::Schema;

/// One resident partition.
#[derive(Debug, Default)]
pub struct Cache {
    partition: Option<Partition>,
    records: Vec<Record>,
    dirty: bool,
}

impl Cache {
    /// Creates a cache that holds no partition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resident partition, if any.
    pub fn partition(&self) -> Option<&Partition> {
        self.partition.as_ref()
    }

    /// Returns `true` if the resident partition covers `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.partition.as_ref().is_some_and(|p| p.contains(date))
    }

    /// Returns `true` if this cache holds the partition stored at `partition.path`.
    pub fn holds(&self, partition: &Partition) -> bool {
        self.partition.as_ref().is_some_and(|p| p.path == partition.path)
    }

    /// Returns the resident records in `idx` order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns `true` if the records have changed since the last load or flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the position of `idx` and whether a record has exactly that key.
    ///
    /// The position is where `idx` is, or where it would be inserted.
    pub fn get_ptr(&self, idx: NaiveDateTime) -> (usize, bool) {
        match self.records.binary_search_by(|r| r.idx().cmp(&idx)) {
            Ok(pos) => (pos, true),
            Err(pos) => (pos, false),
        }
    }

    /// Flushes the current partition, then reads `partition` from disk.
    ///
    /// A missing file loads as an empty partition. Rows whose field count
    /// matches no layout of `schema` are skipped with a warning; any other
    /// decode failure aborts the load.
    ///
    /// Returns the number of skipped rows.
    ///
    /// # Errors
    ///
    /// - any error of [`Cache::flush`]
    /// - [`PartitionError::ReadFailed`] if the file exists but cannot be read
    /// - [`PartitionError::Corrupt`] if a row cannot be decoded
    pub fn load(&mut self, schema: &'static Schema, partition: Partition) -> Result<usize> {
        self.flush()?;
        self.reset();

        let text = match fs::read_to_string(&partition.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.partition = Some(partition);
                return Ok(0);
            }
            Err(e) => {
                return Err(PartitionError::ReadFailed {
                    path: partition.path,
                    source: e,
                }
                .into());
            }
        };

        let mut records = Vec::new();
        let mut skipped = 0;
        for (n, line) in text.lines().enumerate() {
            match codec::decode(schema, line) {
                Ok(record) => records.push(record),
                Err(e) if e.is_skippable() => {
                    tracing::warn!(
                        "skipping invalid {} row at {}:{}: {e}",
                        schema.name,
                        partition.path.display(),
                        n + 1
                    );
                    skipped += 1;
                }
                Err(e) => {
                    return Err(PartitionError::Corrupt {
                        path: partition.path,
                        line: n + 1,
                        source: e,
                    }
                    .into());
                }
            }
        }

        tracing::debug!(
            "loaded {} {} records from {}",
            records.len(),
            schema.name,
            partition.path.display()
        );
        self.records = records;
        self.partition = Some(partition);
        Ok(skipped)
    }

    /// Takes over the partition held by `other` without touching the disk.
    ///
    /// This cache is flushed first. The two caches then swap contents, so
    /// the adopted records and their dirty state exist in exactly one place.
    ///
    /// # Errors
    ///
    /// Any error of [`Cache::flush`].
    pub fn adopt(&mut self, other: &mut Cache) -> Result<()> {
        self.flush()?;
        mem::swap(self, other);
        Ok(())
    }

    /// Writes the partition to disk if it is dirty.
    ///
    /// An empty partition deletes its file instead. Parent directories are
    /// created as needed.
    ///
    /// # Errors
    ///
    /// - [`PartitionError::WriteFailed`] if the file or its directory cannot be written
    /// - [`PartitionError::RemoveFailed`] if an emptied file cannot be deleted
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(partition) = &self.partition else {
            self.dirty = false;
            return Ok(());
        };
        let path = &partition.path;

        if self.records.is_empty() {
            match fs::remove_file(path) {
                Ok(()) => tracing::debug!("removed empty partition {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(PartitionError::RemoveFailed {
                        path: path.clone(),
                        source: e,
                    }
                    .into());
                }
            }
            self.dirty = false;
            return Ok(());
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| PartitionError::WriteFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let mut text = String::new();
        for record in &self.records {
            text.push_str(&codec::encode(record));
            text.push('\n');
        }
        fs::write(path, text).map_err(|e| PartitionError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!("flushed {} records to {}", self.records.len(), path.display());
        self.dirty = false;
        Ok(())
    }

    /// Drops the resident partition without writing it.
    pub fn reset(&mut self) {
        self.partition = None;
        self.records.clear();
        self.dirty = false;
    }

    /// Inserts a record, replacing any record with the same `idx`.
    ///
    /// The caller must have loaded the partition covering the record.
    pub fn upsert(&mut self, record: Record) {
        debug_assert!(self.covers(record.idx().date()));
        match self.get_ptr(record.idx()) {
            (pos, true) => self.records[pos] = record,
            (pos, false) => self.records.insert(pos, record),
        }
        self.dirty = true;
    }

    /// Removes the record with exactly this `idx`.
    pub fn remove(&mut self, idx: NaiveDateTime) -> Option<Record> {
        match self.get_ptr(idx) {
            (pos, true) => {
                self.dirty = true;
                Some(self.records.remove(pos))
            }
            (_, false) => None,
        }
    }

    /// Removes every record with `start <= idx < end` and returns how many.
    pub fn remove_range(&mut self, range: Range<NaiveDateTime>) -> usize {
        let (from, _) = self.get_ptr(range.start);
        let (to, _) = self.get_ptr(range.end);
        if from >= to {
            return 0;
        }
        self.records.drain(from..to);
        self.dirty = true;
        to - from
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Granularity, HOURLY};
    use std::path::Path;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn partition(root: &Path, day: u32) -> Partition {
        Partition::select(root, Granularity::Day, at(day, 0).date())
    }

    fn record(day: u32, hour: u32, rain: f64) -> Record {
        Record::new(&HOURLY, at(day, hour)).with("rain", rain).unwrap()
    }

    #[test]
    fn test_get_ptr() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::new();
        cache.load(&HOURLY, partition(dir.path(), 1)).unwrap();
        assert_eq!(cache.get_ptr(at(1, 5)), (0, false));

        for hour in [2, 6, 4] {
            cache.upsert(record(1, hour, 0.0));
        }
        assert_eq!(cache.get_ptr(at(1, 1)), (0, false));
        assert_eq!(cache.get_ptr(at(1, 2)), (0, true));
        assert_eq!(cache.get_ptr(at(1, 5)), (2, false));
        assert_eq!(cache.get_ptr(at(1, 6)), (2, true));
        assert_eq!(cache.get_ptr(at(1, 7)), (3, false));
    }

    #[test]
    fn test_upsert_overwrites_same_idx() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::new();
        cache.load(&HOURLY, partition(dir.path(), 1)).unwrap();
        assert!(!cache.is_dirty());

        cache.upsert(record(1, 3, 1.0));
        cache.upsert(record(1, 3, 2.0));
        assert!(cache.is_dirty());
        assert_eq!(cache.records().len(), 1);
        assert_eq!(cache.records()[0].get("rain").and_then(|v| v.as_f64()), Some(2.0));
    }

    #[test]
    fn test_flush_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let p = partition(dir.path(), 9);
        let mut cache = Cache::new();
        cache.load(&HOURLY, p.clone()).unwrap();
        cache.upsert(record(9, 1, 0.3));
        cache.upsert(record(9, 0, 0.1));
        cache.flush().unwrap();
        assert!(!cache.is_dirty());

        let text = fs::read_to_string(&p.path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("2022-05-09 00:00:00,"));
        assert!(text.ends_with('\n'));

        let mut other = Cache::new();
        assert_eq!(other.load(&HOURLY, p).unwrap(), 0);
        assert_eq!(other.records(), cache.records());
    }

    #[test]
    fn test_emptied_partition_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = partition(dir.path(), 2);
        let mut cache = Cache::new();
        cache.load(&HOURLY, p.clone()).unwrap();
        cache.upsert(record(2, 8, 0.0));
        cache.flush().unwrap();
        assert!(p.path.exists());

        assert!(cache.remove(at(2, 8)).is_some());
        assert!(cache.remove(at(2, 8)).is_none());
        cache.flush().unwrap();
        assert!(!p.path.exists());
    }

    #[test]
    fn test_load_flushes_previous_partition() {
        let dir = tempfile::tempdir().unwrap();
        let first = partition(dir.path(), 3);
        let mut cache = Cache::new();
        cache.load(&HOURLY, first.clone()).unwrap();
        cache.upsert(record(3, 12, 0.0));

        cache.load(&HOURLY, partition(dir.path(), 4)).unwrap();
        assert!(first.path.exists());
        assert!(cache.records().is_empty());
        assert!(cache.covers(at(4, 0).date()));
    }

    #[test]
    fn test_adopt_swaps_dirty_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut wr = Cache::new();
        let mut rd = Cache::new();
        wr.load(&HOURLY, partition(dir.path(), 5)).unwrap();
        wr.upsert(record(5, 1, 0.0));
        rd.load(&HOURLY, partition(dir.path(), 6)).unwrap();

        rd.adopt(&mut wr).unwrap();
        assert!(rd.covers(at(5, 0).date()));
        assert!(rd.is_dirty());
        assert_eq!(rd.records().len(), 1);
        assert!(wr.covers(at(6, 0).date()));
        assert!(!wr.is_dirty());
    }

    #[test]
    fn test_remove_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::new();
        cache.load(&HOURLY, partition(dir.path(), 7)).unwrap();
        cache.flush().unwrap();
        for hour in 0..6 {
            cache.upsert(record(7, hour, 0.0));
        }
        cache.flush().unwrap();

        assert_eq!(cache.remove_range(at(7, 2)..at(7, 4)), 2);
        assert!(cache.is_dirty());
        let hours: Vec<_> = cache.records().iter().map(|r| r.idx()).collect();
        assert_eq!(hours, [at(7, 0), at(7, 1), at(7, 4), at(7, 5)]);

        cache.flush().unwrap();
        assert_eq!(cache.remove_range(at(7, 2)..at(7, 4)), 0);
        assert!(!cache.is_dirty());
    }
}
