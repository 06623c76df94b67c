//! Partition selection and on-disk layout.
//!
//! A partition is the half-open date range `[lo, hi)` covered by one file.
//! Its file name is always the `lo` date; the directories above it depend on
//! the schema's [`Granularity`]:
//!
//! ```text
//! raw/2024/2024-06/2024-06-01.txt   <- Day
//! daily/2024/2024-06-01.txt         <- Month
//! monthly/2024-01-01.txt            <- Year
//! ```
//!
//! Selection never overflows. The period holding [`NaiveDate::MAX`] has no
//! representable successor: its `hi` saturates at `NaiveDate::MAX` and its
//! [`end`](Partition::end) is [`NaiveDateTime::MAX`], so it still covers
//! every second of its own period.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{PartitionError, Result};
use crate::schema::Granularity;

/// Suffix of every partition file.
const FILE_SUFFIX: &str = ".txt";

/// A partition file and the dates it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Path of the backing file.
    pub path: PathBuf,
    /// First date covered.
    pub lo: NaiveDate,
    /// First date not covered, saturating at `NaiveDate::MAX`.
    pub hi: NaiveDate,
    end: NaiveDateTime,
}

impl Partition {
    /// Selects the partition that holds `date`.
    pub fn select(root: &Path, granularity: Granularity, date: NaiveDate) -> Self {
        let (lo, next) = match granularity {
            Granularity::Day => (date, date.succ_opt()),
            Granularity::Month => month_bounds(date),
            Granularity::Year => year_bounds(date),
        };
        let (hi, end) = match next {
            Some(hi) => (hi, midnight(hi)),
            None => (NaiveDate::MAX, NaiveDateTime::MAX),
        };
        Self {
            path: file_path(root, granularity, lo),
            lo,
            hi,
            end,
        }
    }

    /// Returns `true` if the partition covers `date`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.lo <= date && midnight(date) < self.end
    }

    /// Returns the first instant covered.
    pub fn start(&self) -> NaiveDateTime {
        midnight(self.lo)
    }

    /// Returns the first instant not covered.
    ///
    /// For the last representable period this is [`NaiveDateTime::MAX`],
    /// which lies past every whole-second timestamp.
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
}

/// Returns the start of `date` as a timestamp.
pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Returns the exclusive end of a range of dates whose first uncovered date
/// is `hi`. `NaiveDate::MAX` is read as the saturated bound of the last
/// period and maps to [`NaiveDateTime::MAX`].
pub fn end_of(hi: NaiveDate) -> NaiveDateTime {
    if hi == NaiveDate::MAX {
        NaiveDateTime::MAX
    } else {
        midnight(hi)
    }
}

fn month_bounds(date: NaiveDate) -> (NaiveDate, Option<NaiveDate>) {
    let first = first_of_month(date.year(), date.month()).unwrap_or(date);
    let next = if date.month() == 12 {
        first_of_month(date.year() + 1, 1)
    } else {
        first_of_month(date.year(), date.month() + 1)
    };
    (first, next)
}

fn year_bounds(date: NaiveDate) -> (NaiveDate, Option<NaiveDate>) {
    let first = first_of_month(date.year(), 1).unwrap_or(date);
    (first, first_of_month(date.year() + 1, 1))
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn file_path(root: &Path, granularity: Granularity, lo: NaiveDate) -> PathBuf {
    let file = format!("{}{FILE_SUFFIX}", lo.format("%Y-%m-%d"));
    match granularity {
        Granularity::Day => root
            .join(lo.format("%Y").to_string())
            .join(lo.format("%Y-%m").to_string())
            .join(file),
        Granularity::Month => root.join(lo.format("%Y").to_string()).join(file),
        Granularity::Year => root.join(file),
    }
}

/// Parses the date out of a partition file name such as `2024-06-01.txt`.
///
/// Only names in the exact form this module writes are accepted, including
/// signed years such as `+12345-01-01.txt`.
pub fn parse_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(FILE_SUFFIX)?;
    let date = NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()?;
    (date.format("%Y-%m-%d").to_string() == stem).then_some(date)
}

/// Orders entry names by the signed year they start with, then by the rest.
///
/// Years outside `0..=9999` are written with a sign, which plain name order
/// would put before every four-digit year.
fn year_order(name: &str) -> (i64, &str) {
    let split = name
        .char_indices()
        .skip(1)
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(name.len(), |(i, _)| i);
    let year = name[..split].parse().unwrap_or(i64::MIN);
    (year, &name[split..])
}

/// Which end of the store a scan is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanOrder {
    First,
    Last,
}

/// Finds the date of the first or last partition file below `dir`.
///
/// Entries are visited depth first in year order (reverse order for
/// [`ScanOrder::Last`]). Hidden entries and files whose names are not
/// partition dates are ignored.
pub(crate) fn scan(dir: &Path, order: ScanOrder) -> Result<Option<NaiveDate>> {
    let read = fs::read_dir(dir).map_err(|e| PartitionError::DirectoryAccess {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| PartitionError::DirectoryAccess {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        entries.push((name, entry.path()));
    }
    entries.sort_unstable_by(|a, b| year_order(&a.0).cmp(&year_order(&b.0)));
    if order == ScanOrder::Last {
        entries.reverse();
    }

    for (name, path) in entries {
        if path.is_dir() {
            if let Some(date) = scan(&path, order)? {
                return Ok(Some(date));
            }
        } else if let Some(date) = parse_file_name(&name) {
            return Ok(Some(date));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_partition() {
        let p = Partition::select(Path::new("/data/raw"), Granularity::Day, date(2020, 3, 15));
        assert_eq!(p.lo, date(2020, 3, 15));
        assert_eq!(p.hi, date(2020, 3, 16));
        assert_eq!(p.path, Path::new("/data/raw/2020/2020-03/2020-03-15.txt"));
    }

    #[test]
    fn test_month_partition_rolls_over_year() {
        let p = Partition::select(Path::new("daily"), Granularity::Month, date(2019, 12, 31));
        assert_eq!(p.lo, date(2019, 12, 1));
        assert_eq!(p.hi, date(2020, 1, 1));
        assert_eq!(p.path, Path::new("daily/2019/2019-12-01.txt"));

        let p = Partition::select(Path::new("daily"), Granularity::Month, date(2020, 2, 29));
        assert_eq!((p.lo, p.hi), (date(2020, 2, 1), date(2020, 3, 1)));
    }

    #[test]
    fn test_year_partition() {
        let p = Partition::select(Path::new("monthly"), Granularity::Year, date(2021, 7, 4));
        assert_eq!((p.lo, p.hi), (date(2021, 1, 1), date(2022, 1, 1)));
        assert_eq!(p.path, Path::new("monthly/2021-01-01.txt"));
    }

    #[test]
    fn test_selection_saturates_at_date_extremes() {
        let root = Path::new("r");
        let max = NaiveDate::MAX;

        let p = Partition::select(root, Granularity::Day, max);
        assert_eq!((p.lo, p.hi), (max, max));
        assert_eq!(p.end(), NaiveDateTime::MAX);

        let p = Partition::select(root, Granularity::Month, max);
        assert_eq!((p.lo, p.hi), (date(max.year(), 12, 1), max));

        let p = Partition::select(root, Granularity::Year, max);
        assert_eq!((p.lo, p.hi), (date(max.year(), 1, 1), max));

        for g in [Granularity::Day, Granularity::Month, Granularity::Year] {
            let last = Partition::select(root, g, max);
            assert!(last.contains(max), "{g:?}");
            assert!(last.contains(last.lo), "{g:?}");
            assert!(last.end() > max.and_hms_opt(23, 59, 59).unwrap(), "{g:?}");

            let first = Partition::select(root, g, NaiveDate::MIN);
            assert!(first.contains(NaiveDate::MIN), "{g:?}");
        }
    }

    #[test]
    fn test_day_before_max_excludes_max() {
        let eve = NaiveDate::MAX.pred_opt().unwrap();
        let p = Partition::select(Path::new("r"), Granularity::Day, eve);
        assert_eq!(p.hi, NaiveDate::MAX);
        assert_eq!(p.end(), midnight(NaiveDate::MAX));
        assert!(p.contains(eve));
        assert!(!p.contains(NaiveDate::MAX));
    }

    #[test]
    fn test_boundary_seconds_split_days_not_months() {
        let before = date(2020, 3, 15).and_hms_opt(23, 59, 59).unwrap();
        let after = date(2020, 3, 16).and_hms_opt(0, 0, 1).unwrap();
        let root = Path::new("r");

        let a = Partition::select(root, Granularity::Day, before.date());
        let b = Partition::select(root, Granularity::Day, after.date());
        assert_ne!(a.path, b.path);
        assert_eq!(a.end(), midnight(b.lo));

        let a = Partition::select(root, Granularity::Month, before.date());
        let b = Partition::select(root, Granularity::Month, after.date());
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("2024-06-01.txt"), Some(date(2024, 6, 1)));
        assert_eq!(parse_file_name("2024-6-1.txt"), None);
        assert_eq!(parse_file_name("2024-06-01.csv"), None);
        assert_eq!(parse_file_name("notes.txt"), None);
        assert_eq!(parse_file_name("24-06-01.txt"), None);

        let far = Partition::select(Path::new("r"), Granularity::Year, NaiveDate::MAX);
        let name = far.path.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_file_name(name), Some(far.lo));
    }

    #[test]
    fn test_scan_finds_first_and_last() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for day in [date(2021, 1, 2), date(2020, 12, 31), date(2021, 2, 1)] {
            let p = Partition::select(root, Granularity::Day, day);
            fs::create_dir_all(p.path.parent().unwrap()).unwrap();
            fs::write(&p.path, "").unwrap();
        }
        fs::write(root.join(".lock"), "").unwrap();
        fs::create_dir_all(root.join("2022")).unwrap();
        fs::write(root.join("2022").join("README"), "").unwrap();

        assert_eq!(scan(root, ScanOrder::First).unwrap(), Some(date(2020, 12, 31)));
        assert_eq!(scan(root, ScanOrder::Last).unwrap(), Some(date(2021, 2, 1)));
    }

    #[test]
    fn test_scan_orders_signed_years_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let days = [date(-5, 3, 1), date(1999, 1, 1), date(2024, 6, 1), NaiveDate::MAX];
        for day in days {
            let p = Partition::select(root, Granularity::Day, day);
            fs::create_dir_all(p.path.parent().unwrap()).unwrap();
            fs::write(&p.path, "").unwrap();
        }

        assert_eq!(scan(root, ScanOrder::First).unwrap(), Some(date(-5, 3, 1)));
        assert_eq!(scan(root, ScanOrder::Last).unwrap(), Some(NaiveDate::MAX));
    }

    #[test]
    fn test_scan_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(scan(dir.path(), ScanOrder::First).unwrap(), None);
    }
}
