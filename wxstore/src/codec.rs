//! Line codec for partition files.
//!
//! Every record is one line of comma-separated, unquoted fields in schema
//! order, `idx` first. Null values are empty fields.
//!
//! ```text
//! 2024-06-01 09:00:00,48,65,21.5,71,18.4,1012.3,0.7,1.4,6,1031.7,0,,
//! ```
//!
//! - Floats use the shortest text that parses back to the same `f64`, in
//!   exponent form (`1e-300`) when that is shorter.
//! - Timestamps use `YYYY-MM-DD HH:MM:SS`, UTC, second precision.
//! - Status flags are written as one unsigned integer.
//!
//! Rows shorter than the schema are accepted when their length matches one
//! of [`Schema::row_lengths`]; missing trailing fields decode as null. Any
//! other length is reported as [`CodecError::FieldCount`], which callers
//! treat as a skippable row.

use chrono::NaiveDateTime;

use crate::error::CodecError;
use crate::record::{Record, Status, Value};
use crate::schema::{Field, FieldKind, Schema};

/// `strftime` pattern of every timestamp in a partition file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a timestamp the way it is stored on disk.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

/// Encodes a record as one line, without the trailing newline.
pub fn encode(record: &Record) -> String {
    let mut line = format_timestamp(record.idx());
    for value in record.values() {
        line.push(',');
        if let Some(value) = value {
            write_value(&mut line, value);
        }
    }
    line
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Float(v) => out.push_str(&format_float(*v)),
        Value::Int(v) => out.push_str(&v.to_string()),
        Value::Timestamp(v) => out.push_str(&format_timestamp(*v)),
        Value::Status(v) => out.push_str(&v.bits().to_string()),
    }
}

/// Formats a float as the shortest text that parses back to it.
///
/// Plain decimal notation is used unless the exponent form is shorter.
pub fn format_float(v: f64) -> String {
    let plain = v.to_string();
    let exponent = format!("{v:?}");
    if exponent.len() < plain.len() {
        exponent
    } else {
        plain
    }
}

/// Decodes one line into a record of `schema`.
///
/// # Errors
///
/// - [`CodecError::FieldCount`] if the row length matches no known layout
/// - [`CodecError::MissingIndex`] if the `idx` column is empty
/// - [`CodecError::InvalidValue`] if a field cannot be parsed as its kind
pub fn decode(schema: &'static Schema, line: &str) -> Result<Record, CodecError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let columns: Vec<&str> = line.split(',').collect();

    let expected = schema.row_lengths();
    if !expected.contains(&columns.len()) {
        return Err(CodecError::FieldCount {
            found: columns.len(),
            expected,
        });
    }

    let idx_text = columns[0];
    if idx_text.is_empty() {
        return Err(CodecError::MissingIndex);
    }
    let idx = parse_timestamp(idx_text).ok_or_else(|| CodecError::InvalidValue {
        field: "idx",
        kind: FieldKind::Timestamp,
        text: idx_text.to_string(),
    })?;

    let mut values = Vec::with_capacity(schema.fields.len());
    for (field, text) in schema.fields.iter().zip(&columns[1..]) {
        values.push(parse_value(field, text)?);
    }
    values.resize(schema.fields.len(), None);

    Ok(Record::from_parts(schema, idx, values))
}

fn parse_value(field: &Field, text: &str) -> Result<Option<Value>, CodecError> {
    if text.is_empty() {
        return Ok(None);
    }
    let value = match field.kind {
        FieldKind::Float => text.parse().ok().map(Value::Float),
        FieldKind::Int => text.parse().ok().map(Value::Int),
        FieldKind::Timestamp => parse_timestamp(text).map(Value::Timestamp),
        FieldKind::Status => text.parse::<u8>().ok().map(|b| Value::Status(Status::from_bits(b))),
    };
    value.map(Some).ok_or_else(|| CodecError::InvalidValue {
        field: field.name,
        kind: field.kind,
        text: text.to_string(),
    })
}
