//! Lazy range iteration over a store.
//!
//! [`Store::range`](crate::Store::range) returns a [`RangeIter`], which walks
//! the store's read cache one partition at a time and loads the next
//! partition only when the current one is exhausted. Records come out in
//! strictly ascending `idx` order, across partition boundaries.
//!
//! The iterator holds the store's mutable borrow for its whole life, so no
//! record can be set or deleted while a range is being read:
//!
//! ```rust,compile_fail
//! # use wxstore::{Record, Store, schema::RAW};
//! # let mut store = Store::open("./raw", &RAW).unwrap();
//! let mut records = store.range(..).unwrap();
//! let first = records.next();
//! store.flush().unwrap(); // cannot borrow `store` while `records` is alive
//! drop(records);
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! # use chrono::NaiveDate;
//! # use wxstore::{Store, schema::HOURLY};
//! # let mut store = Store::open("./hourly", &HOURLY)?;
//! let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let start = day.and_hms_opt(0, 0, 0).unwrap();
//! let end = start + chrono::Days::new(7);
//!
//! let mut rain = 0.0;
//! for record in store.range(start..end)? {
//!     rain += record?.get("rain").and_then(|v| v.as_f64()).unwrap_or(0.0);
//! }
//! println!("rain in the week from {day}: {rain} mm");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::iter::FusedIterator;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::record::Record;
use crate::store::{Slot, Store};

/// Ascending iterator over the records with `start <= idx < end`.
///
/// Yields owned copies. A partition error while crossing into the next
/// partition is yielded once, after which the iterator ends.
#[derive(Debug)]
pub struct RangeIter<'a> {
    /// The store being read.
    store: &'a mut Store,
    /// Position of the next record in the read cache.
    pos: usize,
    /// Clamped, inclusive start.
    start: NaiveDateTime,
    /// Clamped, exclusive end.
    end: NaiveDateTime,
    /// Set once the range is exhausted or has failed.
    done: bool,
}

impl<'a> RangeIter<'a> {
    /// Positions a new iterator at `start`, loading its partition.
    pub(crate) fn new(store: &'a mut Store, start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        let mut iter = Self {
            store,
            pos: 0,
            start,
            end,
            done: start >= end,
        };
        if !iter.done {
            iter.store.ensure(Slot::Read, start.date())?;
            iter.pos = iter.store.read_cache().get_ptr(start).0;
        }
        Ok(iter)
    }

    /// Returns the start of the range after clamping.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Returns the end of the range after clamping.
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
}

impl Iterator for RangeIter<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let cache = self.store.read_cache();
            if let Some(record) = cache.records().get(self.pos) {
                if record.idx() >= self.end {
                    break;
                }
                self.pos += 1;
                return Some(Ok(record.clone()));
            }

            // Current partition exhausted: move on if the next one can
            // still hold records before `end`, which is already clamped to
            // the store's bounds.
            let next = match cache.partition() {
                Some(p) if p.end() < self.end => p.hi,
                _ => break,
            };
            if let Err(e) = self.store.ensure(Slot::Read, next) {
                self.done = true;
                return Some(Err(e));
            }
            self.pos = 0;
        }
        self.done = true;
        None
    }
}

impl FusedIterator for RangeIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RAW;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn filled_store(dir: &std::path::Path, days: &[u32]) -> Store {
        let mut store = Store::open(dir, &RAW).unwrap();
        for &d in days {
            for h in [0, 12, 23] {
                store.set(at(d, h), Record::new(&RAW, at(d, h))).unwrap();
            }
        }
        store.flush().unwrap();
        store
    }

    #[test]
    fn test_range_crosses_partitions_and_gaps() {
        let dir = tempdir().unwrap();
        let mut store = filled_store(dir.path(), &[27, 28, 29]);
        store.set(at(1, 6), Record::new(&RAW, at(1, 6))).unwrap();
        store.flush().unwrap();

        let idx: Vec<_> = store
            .range(at(1, 0)..at(28, 0))
            .unwrap()
            .map(|r| r.unwrap().idx())
            .collect();
        assert_eq!(idx, [at(1, 6), at(27, 0), at(27, 12), at(27, 23)]);

        let idx: Vec<_> = store
            .range(at(28, 12)..)
            .unwrap()
            .map(|r| r.unwrap().idx())
            .collect();
        assert_eq!(idx, [at(28, 12), at(28, 23), at(29, 0), at(29, 12), at(29, 23)]);
    }

    #[test]
    fn test_range_stops_at_end() {
        let dir = tempdir().unwrap();
        let mut store = filled_store(dir.path(), &[10, 11, 12]);

        let idx: Vec<_> = store
            .range(at(10, 12)..at(12, 0))
            .unwrap()
            .map(|r| r.unwrap().idx())
            .collect();
        assert_eq!(idx, [at(10, 12), at(10, 23), at(11, 0), at(11, 12), at(11, 23)]);
    }

    #[test]
    fn test_range_reports_clamped_bounds() {
        let dir = tempdir().unwrap();
        let mut store = filled_store(dir.path(), &[5, 6]);

        let iter = store.range(at(1, 0)..at(20, 0)).unwrap();
        assert_eq!(iter.start(), at(5, 0));
        assert_eq!(iter.end(), at(7, 0));
        assert_eq!(iter.count(), 6);
    }

    #[test]
    fn test_range_is_fused() {
        let dir = tempdir().unwrap();
        let mut store = filled_store(dir.path(), &[3]);
        let mut iter = store.range(at(3, 12)..at(3, 13)).unwrap();
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }
}
