//! Storage configuration and the bundle of all five stores.
//!
//! A [`StorageConfig`] names the data directory that holds one
//! subdirectory per schema. It is usually read from a small JSON file:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/weather",
//!   "create_missing": false
//! }
//! ```
//!
//! [`WeatherData::open`] turns it into open stores:
//!
//! ```rust,no_run
//! use wxstore::config::{StorageConfig, WeatherData};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::from_file("/etc/weather/storage.json")?;
//! let mut data = WeatherData::open(&config)?;
//! println!("latest hourly record: {:?}", data.hourly.last()?);
//! data.flush()?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::schema::{self, Schema};
use crate::store::Store;

/// Where the stores live and how to treat a missing data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per schema.
    pub data_dir: PathBuf,
    /// Create `data_dir` if it does not exist. Defaults to `true`.
    #[serde(default = "default_create_missing")]
    pub create_missing: bool,
}

fn default_create_missing() -> bool {
    true
}

impl StorageConfig {
    /// Creates a config for `data_dir` that creates missing directories.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            create_missing: true,
        }
    }

    /// Reads a config from a JSON file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Read`] if the file cannot be read
    /// - [`ConfigError::Parse`] if it is not a valid config
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(config)
    }

    /// Returns the root directory of one schema's store.
    pub fn store_dir(&self, schema: &Schema) -> PathBuf {
        self.data_dir.join(schema.dir_name)
    }
}

/// The five stores of one weather station, opened together.
#[derive(Debug)]
pub struct WeatherData {
    /// Raw station readings.
    pub raw: Store,
    /// Calibrated readings.
    pub calib: Store,
    /// Hourly summaries.
    pub hourly: Store,
    /// Daily summaries.
    pub daily: Store,
    /// Monthly summaries.
    pub monthly: Store,
}

impl WeatherData {
    /// Opens every store below `config.data_dir`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingDataDir`] if the directory is absent and
    ///   `create_missing` is off
    /// - any error of [`Store::open`]
    pub fn open(config: &StorageConfig) -> Result<Self> {
        if !config.create_missing && !config.data_dir.is_dir() {
            return Err(ConfigError::MissingDataDir {
                path: config.data_dir.clone(),
            }
            .into());
        }
        let open = |schema: &'static Schema| Store::open(config.store_dir(schema), schema);

        Ok(Self {
            raw: open(&schema::RAW)?,
            calib: open(&schema::CALIB)?,
            hourly: open(&schema::HOURLY)?,
            daily: open(&schema::DAILY)?,
            monthly: open(&schema::MONTHLY)?,
        })
    }

    /// Returns the store holding records of `schema`.
    pub fn store_mut(&mut self, schema: &Schema) -> Option<&mut Store> {
        self.stores_mut().into_iter().find(|s| s.schema() == schema)
    }

    /// Flushes every store.
    ///
    /// # Errors
    ///
    /// Returns the first flush error. Stores after it are still flushed.
    pub fn flush(&mut self) -> Result<()> {
        let mut first_err = None;
        for store in self.stores_mut() {
            if let Err(e) = store.flush() {
                tracing::warn!("failed to flush {} store: {e}", store.schema().name);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn stores_mut(&mut self) -> [&mut Store; 5] {
        [
            &mut self.raw,
            &mut self.calib,
            &mut self.hourly,
            &mut self.daily,
            &mut self.monthly,
        ]
    }
}
