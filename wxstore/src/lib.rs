//! # wxstore
//!
//! Partitioned flat-file time-series storage for weather station data.
//!
//! wxstore keeps a station's readings and summaries as ordered maps from UTC
//! timestamp to record. Each store splits its records into small text files
//! by day, month or year, and holds at most two of those partitions in
//! memory, however much data is on disk.
//!
//! ## Key Properties
//!
//! - One ordered key per store: the record's `idx` timestamp
//! - Bounded memory: two resident partitions per store
//! - Plain text partitions, one comma-separated record per line
//! - Older files with fewer trailing columns still load
//! - Lazy range scans that cross partition boundaries transparently
//! - No background threads and no write-ahead log; flushing is explicit
//!
//! ## Quick Start
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
//! for (hour, temp) in [(8, 14.2), (9, 15.8), (10, 17.1)] {
//!     let idx = day.and_hms_opt(hour, 0, 0).unwrap();
//!     store.set(idx, Record::new(&RAW, idx).with("temp_out", temp)?)?;
//! }
//!
//! // Neighbour search
//! let noon = day.and_hms_opt(12, 0, 0).unwrap();
//! assert_eq!(store.before(noon)?, Some(day.and_hms_opt(10, 0, 0).unwrap()));
//!
//! // Ordered range scan
//! for record in store.range(day.and_hms_opt(9, 0, 0).unwrap()..noon)? {
//!     let record = record?;
//!     println!("{}: {:?}", record.idx(), record.get("temp_out"));
//! }
//!
//! store.flush()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Store`] - One schema's records; point, range, neighbour and bulk operations
//! - [`Record`] - Schema-checked row keyed by its `idx` timestamp
//! - [`Schema`] - Field list and partition granularity of one resolution
//! - [`RangeIter`] - Lazy ascending scan that borrows its store
//! - [`SharedStore`] - Mutex-guarded store for use across threads
//! - [`WeatherData`] - The five stores of one station, opened from a [`StorageConfig`]
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`store`] - Store lifecycle, lookup, mutation and scans
//! - [`schema`] - The five built-in schemas
//! - [`record`] - Records, values and status flags
//! - [`codec`] - Line format of partition files
//! - [`partition`] - Partition boundaries and file layout
//! - [`cache`] - In-memory partition with dirty tracking
//! - [`query`] - Range iteration
//! - [`shared`] - Thread-safe store handle
//! - [`config`] - Storage configuration
//! - [`transfer`] - Store-to-store copy
//! - [`error`] - Error types

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod partition;
pub mod query;
pub mod record;
pub mod schema;
pub mod shared;
pub mod store;
pub mod transfer;

// Re-export primary API types at crate root for convenience.
pub use config::{StorageConfig, WeatherData};
pub use error::{Result, WxError};
pub use query::RangeIter;
pub use record::{Record, Status, Value};
pub use schema::{FieldKind, Granularity, Schema};
pub use shared::SharedStore;
pub use store::Store;
pub use transfer::{TransferOptions, TransferReport, transfer};
