//! Copying records from one store into another.
//!
//! Used to rebuild a data directory from scratch or move it to a new
//! location. Records are streamed through the source's range iterator, so
//! only the usual two partitions per store are resident at any time.

use chrono::NaiveDateTime;

use crate::config::WeatherData;
use crate::error::{Result, TransferError};
use crate::store::Store;

/// Records between two progress log lines.
const PROGRESS_INTERVAL: usize = 10_000;

/// Options for [`transfer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Clear the sink before copying.
    ///
    /// Without this, copied records overwrite matching timestamps and any
    /// other records already in the sink are kept.
    pub clear_first: bool,
}

/// Outcome of a [`transfer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Number of records copied.
    pub records: usize,
    /// Timestamp of the first record copied.
    pub first: Option<NaiveDateTime>,
    /// Timestamp of the last record copied.
    pub last: Option<NaiveDateTime>,
}

/// Copies every record of `source` into `sink` and flushes `sink`.
///
/// # Errors
///
/// - [`TransferError::SameStore`] if both stores share a root directory
/// - [`TransferError::SchemaMismatch`] if their schemas differ
/// - any error raised while reading `source` or writing `sink`
pub fn transfer(source: &mut Store, sink: &mut Store, options: TransferOptions) -> Result<TransferReport> {
    if source.root() == sink.root() {
        return Err(TransferError::SameStore {
            path: sink.root().to_path_buf(),
        }
        .into());
    }
    if source.schema() != sink.schema() {
        return Err(TransferError::SchemaMismatch {
            source_schema: source.schema().name,
            sink_schema: sink.schema().name,
        }
        .into());
    }

    let name = sink.schema().name;
    if options.clear_first {
        tracing::info!("clearing destination {name} data at {}", sink.root().display());
        sink.clear()?;
    }

    tracing::info!(
        "transferring {name} data from {} to {}",
        source.root().display(),
        sink.root().display()
    );
    let mut report = TransferReport::default();
    for record in source.iterate_all()? {
        let record = record?;
        let idx = record.idx();
        sink.set(idx, record)?;

        report.records += 1;
        report.first.get_or_insert(idx);
        report.last = Some(idx);
        if report.records % PROGRESS_INTERVAL == 0 {
            tracing::info!("{} records so far, current record is {idx}", report.records);
        }
    }
    sink.flush()?;

    tracing::info!("transferred {} {name} records", report.records);
    Ok(report)
}

/// Copies all five stores of `source` into `sink`, highest resolution first.
///
/// # Errors
///
/// Stops at the first store whose [`transfer`] fails.
pub fn transfer_all(
    source: &mut WeatherData,
    sink: &mut WeatherData,
    options: TransferOptions,
) -> Result<[TransferReport; 5]> {
    Ok([
        transfer(&mut source.raw, &mut sink.raw, options)?,
        transfer(&mut source.calib, &mut sink.calib, options)?,
        transfer(&mut source.hourly, &mut sink.hourly, options)?,
        transfer(&mut source.daily, &mut sink.daily, options)?,
        transfer(&mut source.monthly, &mut sink.monthly, options)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::error::WxError;
    use crate::record::Record;
    use crate::schema::{DAILY, HOURLY};
    use chrono::{NaiveDate, TimeDelta};
    use tempfile::tempdir;

    fn hour(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 12, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + TimeDelta::hours(n)
    }

    #[allow(clippy::cast_precision_loss)]
    fn hourly(n: i64) -> Record {
        Record::new(&HOURLY, hour(n)).with("rain", n as f64 / 10.0).unwrap()
    }

    #[test]
    fn test_transfer_copies_everything() {
        let dir = tempdir().unwrap();
        let mut source = Store::open(dir.path().join("a"), &HOURLY).unwrap();
        let mut sink = Store::open(dir.path().join("b"), &HOURLY).unwrap();
        source.update((0..72).map(hourly)).unwrap();

        let report = transfer(&mut source, &mut sink, TransferOptions::default()).unwrap();
        assert_eq!(report.records, 72);
        assert_eq!(report.first, Some(hour(0)));
        assert_eq!(report.last, Some(hour(71)));

        let mut reopened = Store::open(dir.path().join("b"), &HOURLY).unwrap();
        assert_eq!(reopened.snapshot(..).unwrap(), source.snapshot(..).unwrap());
    }

    #[test]
    fn test_clear_first_drops_sink_only_records() {
        let dir = tempdir().unwrap();
        let mut source = Store::open(dir.path().join("a"), &HOURLY).unwrap();
        let mut sink = Store::open(dir.path().join("b"), &HOURLY).unwrap();
        source.update((10..12).map(hourly)).unwrap();
        sink.update([hourly(0)]).unwrap();

        transfer(&mut source, &mut sink, TransferOptions::default()).unwrap();
        assert_eq!(sink.snapshot(..).unwrap().len(), 3);

        transfer(&mut source, &mut sink, TransferOptions { clear_first: true }).unwrap();
        let idx: Vec<_> = sink.snapshot(..).unwrap().iter().map(Record::idx).collect();
        assert_eq!(idx, [hour(10), hour(11)]);
    }

    #[test]
    fn test_transfer_rejects_same_store_and_schema_mismatch() {
        let dir = tempdir().unwrap();
        let mut a = Store::open(dir.path().join("a"), &HOURLY).unwrap();
        let mut same = Store::open(dir.path().join("a"), &HOURLY).unwrap();
        let err = transfer(&mut a, &mut same, TransferOptions::default()).unwrap_err();
        assert!(matches!(err, WxError::Transfer(TransferError::SameStore { .. })));

        let mut daily = Store::open(dir.path().join("d"), &DAILY).unwrap();
        let err = transfer(&mut a, &mut daily, TransferOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            WxError::Transfer(TransferError::SchemaMismatch {
                source_schema: "hourly",
                sink_schema: "daily"
            })
        ));
    }

    #[test]
    fn test_transfer_all() {
        let dir = tempdir().unwrap();
        let mut source = WeatherData::open(&StorageConfig::new(dir.path().join("old"))).unwrap();
        let mut sink = WeatherData::open(&StorageConfig::new(dir.path().join("new"))).unwrap();
        source.hourly.update((0..5).map(hourly)).unwrap();
        let day = hour(0);
        source.daily.set(day, Record::new(&DAILY, day)).unwrap();

        let reports = transfer_all(&mut source, &mut sink, TransferOptions::default()).unwrap();
        let counts: Vec<_> = reports.iter().map(|r| r.records).collect();
        assert_eq!(counts, [0, 0, 5, 1, 0]);
        assert!(sink.daily.contains(day).unwrap());
    }
}
