//! Typed records and values.
//!
//! A [`Record`] is bound to one [`Schema`] and always carries its `idx`
//! timestamp. Non-key fields are nullable and are checked against the
//! schema when they are set, so a record that exists is always well formed.
//! Timestamps, the key included, are truncated to whole seconds on the way
//! in, matching what a partition file can hold.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use wxstore::record::{Record, Value};
//! use wxstore::schema::RAW;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let idx = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
//! let record = Record::new(&RAW, idx)
//!     .with("temp_out", 18.4)?
//!     .with("hum_out", 71)?;
//!
//! assert_eq!(record.get("temp_out"), Some(&Value::Float(18.4)));
//! assert_eq!(record.get("rain"), None);
//! assert!(record.clone().with("temp_out", 71).is_err());
//! # Ok(())
//! # }
//! ```

use std::fmt;

use chrono::{NaiveDateTime, Timelike};

use crate::error::{QueryError, RecordError, Result};
use crate::schema::{FieldKind, Schema};

/// Station status flags, stored as one unsigned byte.
///
/// Bits 0 to 5 carry no documented meaning and are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(u8);

impl Status {
    /// The station lost contact with the outdoor sensors.
    pub const LOST_CONNECTION: u8 = 1 << 6;
    /// The rain counter wrapped around.
    pub const RAIN_OVERFLOW: u8 = 1 << 7;

    /// Flag names in bit order.
    pub const NAMES: [&'static str; 8] = [
        "bit0",
        "bit1",
        "bit2",
        "bit3",
        "bit4",
        "bit5",
        "lost_connection",
        "rain_overflow",
    ];

    /// Creates a status from its raw bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit of `mask` is set.
    pub const fn contains(self, mask: u8) -> bool {
        (self.0 & mask) == mask
    }

    /// Returns the state of a named flag, or `None` for an unknown name.
    pub fn flag(self, name: &str) -> Option<bool> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .map(|bit| (self.0 & (1u8 << bit)) != 0)
    }

    /// Returns the names of all set flags in bit order.
    pub fn set_flags(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .enumerate()
            .filter(move |(bit, _)| (self.0 & (1u8 << *bit)) != 0)
            .map(|(_, name)| name)
    }
}

impl From<u8> for Status {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

/// A single field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Floating-point reading.
    Float(f64),
    /// Integer reading.
    Int(i64),
    /// UTC timestamp.
    Timestamp(NaiveDateTime),
    /// Station status flags.
    Status(Status),
}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Float(_) => FieldKind::Float,
            Self::Int(_) => FieldKind::Int,
            Self::Timestamp(_) => FieldKind::Timestamp,
            Self::Status(_) => FieldKind::Status,
        }
    }

    /// Returns the value as a float, widening integers.
    #[allow(clippy::cast_precision_loss)] // station integers are small
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a timestamp.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match *self {
            Self::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as status flags.
    pub fn as_status(&self) -> Option<Status> {
        match *self {
            Self::Status(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Status> for Value {
    fn from(v: Status) -> Self {
        Self::Status(v)
    }
}

/// Drops the sub-second part of a timestamp.
pub(crate) fn whole_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

fn truncated(value: Value) -> Value {
    match value {
        Value::Timestamp(ts) => Value::Timestamp(whole_seconds(ts)),
        other => other,
    }
}

/// One row of a store, keyed by its UTC timestamp.
#[derive(Clone, PartialEq)]
pub struct Record {
    schema: &'static Schema,
    idx: NaiveDateTime,
    values: Vec<Option<Value>>,
}

impl Record {
    /// Creates a record with every non-key field null.
    pub fn new(schema: &'static Schema, idx: NaiveDateTime) -> Self {
        Self {
            schema,
            idx: whole_seconds(idx),
            values: vec![None; schema.fields.len()],
        }
    }

    /// Builds a record from name/value pairs.
    ///
    /// An `idx` pair is required and must hold a timestamp.
    ///
    /// # Errors
    ///
    /// - [`QueryError::InvalidIndexType`] if `idx` is not a timestamp
    /// - [`RecordError::MissingIndex`] if no `idx` pair is given
    /// - [`RecordError::UnknownField`] or [`RecordError::KindMismatch`] for
    ///   a pair that does not fit the schema
    pub fn from_pairs<'n, I>(schema: &'static Schema, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'n str, Value)>,
    {
        let mut idx = None;
        let mut values = vec![None; schema.fields.len()];

        for (name, value) in pairs {
            if name == "idx" {
                match value {
                    Value::Timestamp(ts) => idx = Some(whole_seconds(ts)),
                    other => {
                        return Err(QueryError::InvalidIndexType { found: other.kind() }.into());
                    }
                }
                continue;
            }
            let pos = Self::checked_position(schema, name, &value)?;
            values[pos] = Some(truncated(value));
        }

        let idx = idx.ok_or(RecordError::MissingIndex {
            schema: schema.name,
        })?;
        Ok(Self { schema, idx, values })
    }

    /// Builds a record from already-validated parts.
    pub(crate) fn from_parts(
        schema: &'static Schema,
        idx: NaiveDateTime,
        values: Vec<Option<Value>>,
    ) -> Self {
        debug_assert_eq!(values.len(), schema.fields.len());
        Self { schema, idx, values }
    }

    fn checked_position(schema: &'static Schema, name: &str, value: &Value) -> Result<usize> {
        let pos = schema.position(name).ok_or_else(|| RecordError::UnknownField {
            schema: schema.name,
            field: name.to_string(),
        })?;
        let field = &schema.fields[pos];
        if field.kind != value.kind() {
            return Err(RecordError::KindMismatch {
                field: field.name,
                expected: field.kind,
                found: value.kind(),
            }
            .into());
        }
        Ok(pos)
    }

    /// Returns the schema this record belongs to.
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Returns the record's timestamp key.
    pub fn idx(&self) -> NaiveDateTime {
        self.idx
    }

    /// Replaces the timestamp key, truncated to whole seconds.
    pub fn set_idx(&mut self, idx: NaiveDateTime) {
        self.idx = whole_seconds(idx);
    }

    /// Returns a field value, or `None` if the field is null or unknown.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema
            .position(name)
            .and_then(|pos| self.values[pos].as_ref())
    }

    /// Sets a field value.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] or [`RecordError::KindMismatch`]
    /// if the field does not exist or holds a different kind. The record is
    /// unchanged on error.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let pos = Self::checked_position(self.schema, name, &value)?;
        self.values[pos] = Some(truncated(value));
        Ok(())
    }

    /// Sets a field value and returns the record, for chained construction.
    ///
    /// # Errors
    ///
    /// Same as [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Sets a field to null.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] if the field does not exist.
    pub fn clear(&mut self, name: &str) -> Result<()> {
        let pos = self.schema.position(name).ok_or_else(|| RecordError::UnknownField {
            schema: self.schema.name,
            field: name.to_string(),
        })?;
        self.values[pos] = None;
        Ok(())
    }

    /// Returns the non-key values in schema column order.
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Iterates over `(name, value)` for every non-key field.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, Option<&Value>)> + '_ {
        self.schema
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name, v.as_ref()))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        map.entry(&"idx", &self.idx);
        for (name, value) in self.fields() {
            if let Some(value) = value {
                map.entry(&name, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WxError;
    use crate::schema::{DAILY, RAW};
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 7, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_new_record_is_all_null() {
        let record = Record::new(&RAW, ts(9, 0));
        assert_eq!(record.idx(), ts(9, 0));
        assert_eq!(record.values().len(), RAW.fields.len());
        assert!(record.values().iter().all(Option::is_none));
    }

    #[test]
    fn test_set_validates_name_and_kind() {
        let mut record = Record::new(&RAW, ts(9, 0));

        record.set("temp_out", 12.5).unwrap();
        assert_eq!(record.get("temp_out").and_then(Value::as_f64), Some(12.5));

        let err = record.set("pressure_trend", 1.0).unwrap_err();
        assert!(matches!(err, WxError::Record(RecordError::UnknownField { .. })));

        let err = record.set("temp_out", 3).unwrap_err();
        assert!(matches!(
            err,
            WxError::Record(RecordError::KindMismatch {
                expected: FieldKind::Float,
                found: FieldKind::Int,
                ..
            })
        ));
        // Failed sets leave the record untouched.
        assert_eq!(record.get("temp_out"), Some(&Value::Float(12.5)));
    }

    #[test]
    fn test_from_pairs_requires_timestamp_idx() {
        let record = Record::from_pairs(
            &DAILY,
            [
                ("idx", Value::from(ts(21, 0))),
                ("start", Value::from(ts(9, 0))),
                ("rain", Value::from(4.2)),
            ],
        )
        .unwrap();
        assert_eq!(record.idx(), ts(21, 0));
        assert_eq!(record.get("start"), Some(&Value::Timestamp(ts(9, 0))));

        let err = Record::from_pairs(&DAILY, [("idx", Value::Int(7))]).unwrap_err();
        assert!(matches!(
            err,
            WxError::Query(QueryError::InvalidIndexType { found: FieldKind::Int })
        ));

        let err = Record::from_pairs(&DAILY, [("rain", Value::Float(1.0))]).unwrap_err();
        assert!(matches!(err, WxError::Record(RecordError::MissingIndex { .. })));
    }

    #[test]
    fn test_status_flags() {
        let status = Status::from_bits(Status::LOST_CONNECTION | 0b1);
        assert!(status.contains(Status::LOST_CONNECTION));
        assert!(!status.contains(Status::RAIN_OVERFLOW));
        assert_eq!(status.flag("bit0"), Some(true));
        assert_eq!(status.flag("rain_overflow"), Some(false));
        assert_eq!(status.flag("bogus"), None);
        assert_eq!(status.set_flags().collect::<Vec<_>>(), ["bit0", "lost_connection"]);
    }

    #[test]
    fn test_timestamps_are_truncated_to_seconds() {
        let precise = ts(6, 30) + chrono::TimeDelta::milliseconds(750);

        let mut record = Record::new(&DAILY, precise);
        assert_eq!(record.idx(), ts(6, 30));

        record.set_idx(precise + chrono::TimeDelta::seconds(1));
        assert_eq!(record.idx(), ts(6, 30) + chrono::TimeDelta::seconds(1));

        record.set("temp_out_max_t", precise).unwrap();
        assert_eq!(record.get("temp_out_max_t"), Some(&Value::Timestamp(ts(6, 30))));

        let record = Record::from_pairs(&DAILY, [("idx", Value::from(precise))]).unwrap();
        assert_eq!(record.idx(), ts(6, 30));
    }

    #[test]
    fn test_clear_field() {
        let mut record = Record::new(&RAW, ts(9, 0)).with("rain", 0.3).unwrap();
        record.clear("rain").unwrap();
        assert_eq!(record.get("rain"), None);
        assert!(record.clear("nope").is_err());
    }
}
