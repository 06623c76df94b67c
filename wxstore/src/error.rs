//! Error types for the wxstore time-series storage engine.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::schema::FieldKind;

/// The main error type for all wxstore operations.
///
/// Each variant wraps a narrower error enum for one concern of the engine:
/// point lookups, range requests, record construction, the line codec,
/// partition file I/O, configuration and store transfer.
#[derive(Error, Debug)]
pub enum WxError {
    /// A point operation addressed a timestamp with no record.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// A range or index request had an unsupported shape.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// A record did not agree with its schema.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// A partition file could not be read, written or removed.
    #[error("partition error: {0}")]
    Partition(#[from] PartitionError),

    /// The storage configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Copying one store into another failed before it started.
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl WxError {
    /// Returns `true` if this error is a missing exact lookup.
    ///
    /// A missing record is the one recoverable condition callers are
    /// expected to check for routinely.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Lookup(LookupError::NotFound { .. }))
    }
}

/// Errors raised by exact point operations.
#[derive(Error, Debug)]
pub enum LookupError {
    /// No record has exactly this timestamp.
    #[error("no record at {idx}")]
    NotFound {
        /// The requested timestamp.
        idx: NaiveDateTime,
    },
}

/// Errors raised by malformed index or range requests.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A key value that is not a timestamp was supplied as `idx`.
    #[error("index must be a timestamp, found {found:?}")]
    InvalidIndexType {
        /// The kind of value that was supplied.
        found: FieldKind,
    },

    /// The range shape is not supported (only half-open `[a, b)` ranges are).
    #[error("unsupported range: {reason}")]
    InvalidSlice {
        /// Description of the unsupported bound.
        reason: &'static str,
    },
}

/// Errors raised when building or storing a record.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The field name is not part of the record's schema.
    #[error("schema '{schema}' has no field '{field}'")]
    UnknownField {
        /// The schema name.
        schema: &'static str,
        /// The rejected field name.
        field: String,
    },

    /// The value kind does not match the field's declared kind.
    #[error("field '{field}' expects {expected:?}, found {found:?}")]
    KindMismatch {
        /// The field name.
        field: &'static str,
        /// The kind declared by the schema.
        expected: FieldKind,
        /// The kind of the supplied value.
        found: FieldKind,
    },

    /// A record built from name/value pairs had no `idx`.
    #[error("record for schema '{schema}' has no idx")]
    MissingIndex {
        /// The schema name.
        schema: &'static str,
    },

    /// A record of one schema was written to a store of another.
    #[error("record of schema '{found}' cannot be stored in a '{expected}' store")]
    SchemaMismatch {
        /// The store's schema name.
        expected: &'static str,
        /// The record's schema name.
        found: &'static str,
    },
}

/// Errors raised while decoding one line of a partition file.
#[derive(Error, Debug, PartialEq)]
pub enum CodecError {
    /// The row has a field count that matches no known layout of the schema.
    ///
    /// This is the only recoverable decode failure: the row is skipped and
    /// logged, and loading continues with the next line.
    #[error("row has {found} fields, expected one of {expected:?}")]
    FieldCount {
        /// Number of comma-separated fields in the row.
        found: usize,
        /// The field counts the schema accepts.
        expected: [usize; 2],
    },

    /// The `idx` column was empty.
    #[error("row has an empty idx")]
    MissingIndex,

    /// A field's text could not be parsed as its declared kind.
    #[error("field '{field}' cannot parse {text:?} as {kind:?}")]
    InvalidValue {
        /// The field name.
        field: &'static str,
        /// The declared kind.
        kind: FieldKind,
        /// The offending text.
        text: String,
    },
}

impl CodecError {
    /// Returns `true` if the row should be skipped rather than failing the load.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::FieldCount { .. })
    }
}

/// Errors raised by partition file I/O.
#[derive(Error, Debug)]
pub enum PartitionError {
    /// Failed to read a partition file.
    #[error("failed to read partition '{}': {source}", path.display())]
    ReadFailed {
        /// The partition file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a partition file or create its directory.
    #[error("failed to write partition '{}': {source}", path.display())]
    WriteFailed {
        /// The partition file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a partition file or directory.
    #[error("failed to remove '{}': {source}", path.display())]
    RemoveFailed {
        /// The path that could not be removed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store root directory could not be created or scanned.
    #[error("failed to access store directory '{}': {source}", path.display())]
    DirectoryAccess {
        /// The directory path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line of a partition file could not be decoded.
    #[error("corrupt partition '{}' at line {line}: {source}", path.display())]
    Corrupt {
        /// The partition file path.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// The decode failure.
        #[source]
        source: CodecError,
    },
}

/// Errors raised while loading a storage configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`StorageConfig`](crate::config::StorageConfig).
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The data directory does not exist and creation was not requested.
    #[error("data directory '{}' does not exist", path.display())]
    MissingDataDir {
        /// The configured data directory.
        path: PathBuf,
    },
}

/// Errors raised before a store transfer begins.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Source and sink are the same store directory.
    #[error("source and sink are the same store '{}'", path.display())]
    SameStore {
        /// The shared root directory.
        path: PathBuf,
    },

    /// Source and sink hold different record schemas.
    #[error("cannot transfer '{source_schema}' records into a '{sink_schema}' store")]
    SchemaMismatch {
        /// The source store's schema name.
        source_schema: &'static str,
        /// The sink store's schema name.
        sink_schema: &'static str,
    },
}

/// Type alias for `Result<T, WxError>`.
pub type Result<T> = std::result::Result<T, WxError>;
