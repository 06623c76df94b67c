//! Record schemas for the five weather data resolutions.
//!
//! A [`Schema`] is plain data: an ordered list of typed fields, the
//! directory the store lives in, and the [`Granularity`] that decides how
//! timestamps are grouped into partition files. Every store shares the same
//! engine and differs only in the schema it is opened with.
//!
//! The `idx` key is implicit. It is always the first column of a row and is
//! not listed in [`Schema::fields`].
//!
//! # Example
//!
//! ```rust
//! use wxstore::schema::{self, FieldKind, Granularity};
//!
//! assert_eq!(schema::RAW.granularity, Granularity::Day);
//! assert_eq!(schema::RAW.field("status").map(|f| f.kind), Some(FieldKind::Status));
//! assert_eq!(schema::MONTHLY.row_lengths(), [62, 50]);
//! ```

use serde::{Deserialize, Serialize};

/// The value kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// 64-bit float, written in shortest round-trip form.
    Float,
    /// Signed integer.
    Int,
    /// UTC timestamp with second precision.
    Timestamp,
    /// 8-bit station status flags.
    Status,
}

/// A named, typed column of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: &'static str,
    /// Value kind stored in the column.
    pub kind: FieldKind,
}

impl Field {
    const fn float(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Float }
    }

    const fn int(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Int }
    }

    const fn time(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Timestamp }
    }

    const fn status(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Status }
    }
}

/// How a schema groups timestamps into partition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One file per calendar day: `root/YYYY/YYYY-MM/YYYY-MM-DD.txt`.
    Day,
    /// One file per calendar month: `root/YYYY/YYYY-MM-01.txt`.
    Month,
    /// One file per calendar year: `root/YYYY-01-01.txt`.
    Year,
}

/// Static description of one resolution's record shape.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    /// Human readable schema name.
    pub name: &'static str,
    /// Directory name of the store below the data root.
    pub dir_name: &'static str,
    /// Non-key fields in file column order.
    pub fields: &'static [Field],
    /// Number of trailing fields that older files may omit.
    ///
    /// Files written before illuminance and UV sensors were supported stop
    /// short of the solar columns.
    pub solar_fields: usize,
    /// Partition granularity.
    pub granularity: Granularity,
}

impl Schema {
    /// Returns the full column count of a row, including `idx`.
    pub fn row_len(&self) -> usize {
        self.fields.len() + 1
    }

    /// Returns the column counts a partition row may have.
    ///
    /// The first entry is the current layout, the second the historical
    /// layout without solar columns. Rows of any other length are skipped.
    pub fn row_lengths(&self) -> [usize; 2] {
        let full = self.row_len();
        [full, full - self.solar_fields]
    }

    /// Returns the position of a non-key field.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the field with the given name.
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up one of the built-in schemas by name or directory name.
    pub fn by_name(name: &str) -> Option<&'static Schema> {
        ALL.iter()
            .copied()
            .find(|s| s.name == name || s.dir_name == name)
    }
}

/// All built-in schemas, from highest to lowest resolution.
pub static ALL: [&Schema; 5] = [&RAW, &CALIB, &HOURLY, &DAILY, &MONTHLY];

/// Raw readings as decoded from the station.
pub static RAW: Schema = Schema {
    name: "raw",
    dir_name: "raw",
    fields: &[
        Field::int("delay"),
        Field::int("hum_in"),
        Field::float("temp_in"),
        Field::int("hum_out"),
        Field::float("temp_out"),
        Field::float("abs_pressure"),
        Field::float("wind_ave"),
        Field::float("wind_gust"),
        Field::int("wind_dir"),
        Field::float("rain"),
        Field::status("status"),
        Field::float("illuminance"),
        Field::int("uv"),
    ],
    solar_fields: 2,
    granularity: Granularity::Day,
};

/// Calibrated readings.
pub static CALIB: Schema = Schema {
    name: "calib",
    dir_name: "calib",
    fields: &[
        Field::int("delay"),
        Field::int("hum_in"),
        Field::float("temp_in"),
        Field::int("hum_out"),
        Field::float("temp_out"),
        Field::float("abs_pressure"),
        Field::float("rel_pressure"),
        Field::float("wind_ave"),
        Field::float("wind_gust"),
        Field::float("wind_dir"),
        Field::float("rain"),
        Field::status("status"),
        Field::float("illuminance"),
        Field::int("uv"),
    ],
    solar_fields: 2,
    granularity: Granularity::Day,
};

/// Hourly summaries.
pub static HOURLY: Schema = Schema {
    name: "hourly",
    dir_name: "hourly",
    fields: &[
        Field::int("hum_in"),
        Field::float("temp_in"),
        Field::int("hum_out"),
        Field::float("temp_out"),
        Field::float("abs_pressure"),
        Field::float("rel_pressure"),
        Field::float("pressure_trend"),
        Field::float("wind_ave"),
        Field::float("wind_gust"),
        Field::float("wind_dir"),
        Field::float("rain"),
        Field::float("illuminance"),
        Field::int("uv"),
    ],
    solar_fields: 2,
    granularity: Granularity::Day,
};

/// Daily summaries, one file per month.
pub static DAILY: Schema = Schema {
    name: "daily",
    dir_name: "daily",
    fields: &[
        Field::time("start"),
        Field::float("hum_out_ave"),
        Field::int("hum_out_min"),
        Field::time("hum_out_min_t"),
        Field::int("hum_out_max"),
        Field::time("hum_out_max_t"),
        Field::float("temp_out_ave"),
        Field::float("temp_out_min"),
        Field::time("temp_out_min_t"),
        Field::float("temp_out_max"),
        Field::time("temp_out_max_t"),
        Field::float("hum_in_ave"),
        Field::int("hum_in_min"),
        Field::time("hum_in_min_t"),
        Field::int("hum_in_max"),
        Field::time("hum_in_max_t"),
        Field::float("temp_in_ave"),
        Field::float("temp_in_min"),
        Field::time("temp_in_min_t"),
        Field::float("temp_in_max"),
        Field::time("temp_in_max_t"),
        Field::float("abs_pressure_ave"),
        Field::float("abs_pressure_min"),
        Field::time("abs_pressure_min_t"),
        Field::float("abs_pressure_max"),
        Field::time("abs_pressure_max_t"),
        Field::float("rel_pressure_ave"),
        Field::float("rel_pressure_min"),
        Field::time("rel_pressure_min_t"),
        Field::float("rel_pressure_max"),
        Field::time("rel_pressure_max_t"),
        Field::float("wind_ave"),
        Field::float("wind_gust"),
        Field::time("wind_gust_t"),
        Field::float("wind_dir"),
        Field::float("rain"),
        Field::float("illuminance_ave"),
        Field::float("illuminance_max"),
        Field::time("illuminance_max_t"),
        Field::float("uv_ave"),
        Field::int("uv_max"),
        Field::time("uv_max_t"),
    ],
    solar_fields: 6,
    granularity: Granularity::Month,
};

/// Monthly summaries, one file per year.
pub static MONTHLY: Schema = Schema {
    name: "monthly",
    dir_name: "monthly",
    fields: &[
        Field::time("start"),
        Field::float("hum_out_ave"),
        Field::int("hum_out_min"),
        Field::time("hum_out_min_t"),
        Field::int("hum_out_max"),
        Field::time("hum_out_max_t"),
        Field::float("temp_out_ave"),
        Field::float("temp_out_min_lo"),
        Field::time("temp_out_min_lo_t"),
        Field::float("temp_out_min_hi"),
        Field::time("temp_out_min_hi_t"),
        Field::float("temp_out_min_ave"),
        Field::float("temp_out_max_lo"),
        Field::time("temp_out_max_lo_t"),
        Field::float("temp_out_max_hi"),
        Field::time("temp_out_max_hi_t"),
        Field::float("temp_out_max_ave"),
        Field::float("hum_in_ave"),
        Field::int("hum_in_min"),
        Field::time("hum_in_min_t"),
        Field::int("hum_in_max"),
        Field::time("hum_in_max_t"),
        Field::float("temp_in_ave"),
        Field::float("temp_in_min_lo"),
        Field::time("temp_in_min_lo_t"),
        Field::float("temp_in_min_hi"),
        Field::time("temp_in_min_hi_t"),
        Field::float("temp_in_min_ave"),
        Field::float("temp_in_max_lo"),
        Field::time("temp_in_max_lo_t"),
        Field::float("temp_in_max_hi"),
        Field::time("temp_in_max_hi_t"),
        Field::float("temp_in_max_ave"),
        Field::float("abs_pressure_ave"),
        Field::float("abs_pressure_min"),
        Field::time("abs_pressure_min_t"),
        Field::float("abs_pressure_max"),
        Field::time("abs_pressure_max_t"),
        Field::float("rel_pressure_ave"),
        Field::float("rel_pressure_min"),
        Field::time("rel_pressure_min_t"),
        Field::float("rel_pressure_max"),
        Field::time("rel_pressure_max_t"),
        Field::float("wind_ave"),
        Field::float("wind_gust"),
        Field::time("wind_gust_t"),
        Field::float("wind_dir"),
        Field::float("rain"),
        Field::int("rain_days"),
        Field::float("illuminance_ave"),
        Field::float("illuminance_max_lo"),
        Field::time("illuminance_max_lo_t"),
        Field::float("illuminance_max_hi"),
        Field::time("illuminance_max_hi_t"),
        Field::float("illuminance_max_ave"),
        Field::float("uv_ave"),
        Field::int("uv_max_lo"),
        Field::time("uv_max_lo_t"),
        Field::int("uv_max_hi"),
        Field::time("uv_max_hi_t"),
        Field::float("uv_max_ave"),
    ],
    solar_fields: 12,
    granularity: Granularity::Year,
};
