use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum::{Display, EnumString};

use crate::{
    data::timestamp::TimestampFormat,
    error::{ConfigError, FxPipeResult},
    io::FileFormat,
};

// ================================================================================================
// File Locations
// ================================================================================================

/// Location, format and read options of a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Relative paths are resolved against the directory of the config file.
    pub path: PathBuf,

    #[serde(rename = "type", default)]
    pub format: FileFormat,

    #[serde(default)]
    pub read_args: ReadArgs,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
            read_args: ReadArgs::default(),
        }
    }

    fn resolve(&mut self, base_dir: &Path) {
        if self.path.is_relative() {
            self.path = base_dir.join(&self.path);
        }
    }
}

/// Per-file reader (and writer) options.
///
/// Unknown keys are ignored so that configs written for other tools still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadArgs {
    /// Field delimiter for CSV files. Must be a single ASCII character.
    #[serde(alias = "sep")]
    pub separator: Option<char>,

    /// Whether the CSV file has (or is written with) a header row. Defaults to `true`.
    pub has_header: Option<bool>,

    /// Restricts the loaded table to these columns.
    #[serde(alias = "usecols")]
    pub columns: Option<Vec<String>>,

    #[serde(alias = "skiprows")]
    pub skip_rows: Option<usize>,
}

// ================================================================================================
// Price Conversion
// ================================================================================================

/// Column-name aliases of the price conversion tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateColumns {
    pub timestamp: String,
    pub price: String,
    pub ccy_pair: String,
    pub spot_rate: String,
    pub conversion_factor: String,
    pub convert_price: String,
}

impl Default for RateColumns {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            price: "price".to_string(),
            ccy_pair: "ccy_pair".to_string(),
            spot_rate: "spot_mid_rate".to_string(),
            conversion_factor: "conversion_factor".to_string(),
            convert_price: "convert_price".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateFiles {
    pub ccy_file: FileConfig,
    pub price_file: FileConfig,
    pub spot_file: FileConfig,
}

/// On-disk configuration of the price conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    pub data: RateFiles,

    pub output_file: FileConfig,

    #[serde(default = "default_rate_timestamp_format")]
    pub timestamp_format: TimestampFormat,

    #[serde(default)]
    pub columns: RateColumns,

    /// Maximum backward gap between a price and its spot rate, e.g. `"1h"`.
    #[serde(default = "default_tolerance", with = "humantime_delta")]
    pub tolerance: TimeDelta,
}

impl RateConfig {
    pub fn from_path(path: impl AsRef<Path>) -> FxPipeResult<Self> {
        let (mut cfg, base_dir): (Self, _) = load_json(path.as_ref())?;
        cfg.data.ccy_file.resolve(&base_dir);
        cfg.data.price_file.resolve(&base_dir);
        cfg.data.spot_file.resolve(&base_dir);
        cfg.output_file.resolve(&base_dir);
        Ok(cfg)
    }

    pub fn settings(&self) -> FxPipeResult<ConversionSettings> {
        ConversionSettings {
            columns: self.columns.clone(),
            timestamp_format: self.timestamp_format.clone(),
            tolerance: self.tolerance,
        }
        .validated()
    }
}

/// Resolved, immutable settings of the price conversion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSettings {
    pub columns: RateColumns,
    pub timestamp_format: TimestampFormat,
    pub tolerance: TimeDelta,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            columns: RateColumns::default(),
            timestamp_format: default_rate_timestamp_format(),
            tolerance: default_tolerance(),
        }
    }
}

impl ConversionSettings {
    pub fn with_columns(self, columns: RateColumns) -> Self {
        Self { columns, ..self }
    }

    pub fn with_timestamp_format(self, pattern: &str) -> Self {
        Self {
            timestamp_format: TimestampFormat::new(pattern),
            ..self
        }
    }

    pub fn with_tolerance(self, tolerance: TimeDelta) -> Self {
        Self { tolerance, ..self }
    }

    /// Rejects a tolerance that is not strictly positive.
    pub fn validated(self) -> FxPipeResult<Self> {
        if self.tolerance <= TimeDelta::zero() {
            return Err(ConfigError::InvalidDuration {
                value: self.tolerance.to_string(),
                msg: "tolerance must be strictly positive".to_string(),
            }
            .into());
        }
        Ok(self)
    }
}

// ================================================================================================
// Rolling Standard Deviation
// ================================================================================================

/// Column-name aliases of the observation table.
///
/// The timestamp column is configured through [`CalculationParams::timestamp_col`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StdevColumns {
    pub security_id: String,
    pub bid: String,
    pub mid: String,
    pub ask: String,
}

impl Default for StdevColumns {
    fn default() -> Self {
        Self {
            security_id: "security_id".to_string(),
            bid: "bid".to_string(),
            mid: "mid".to_string(),
            ask: "ask".to_string(),
        }
    }
}

/// Degrees-of-freedom convention of the rolling standard deviation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StdevKind {
    /// Divides by `n - 1`.
    #[default]
    Sample,
    /// Divides by `n`.
    Population,
}

impl StdevKind {
    pub fn ddof(&self) -> usize {
        match self {
            Self::Sample => 1,
            Self::Population => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationParams {
    /// First timestamp (inclusive) emitted in the output.
    pub start_calc: String,
    /// Last timestamp (inclusive) emitted in the output.
    pub end_calc: String,
    pub date_format: TimestampFormat,
    pub timestamp_col: String,
    pub window_size: usize,
    #[serde(with = "humantime_delta")]
    pub step: TimeDelta,
    pub std_kind: StdevKind,
    /// Adds the derived `contig_block` column to the output.
    pub include_block_id: bool,
}

impl Default for CalculationParams {
    fn default() -> Self {
        Self {
            start_calc: "2021-11-20 00:00:00".to_string(),
            end_calc: "2021-11-23 09:00:00".to_string(),
            date_format: TimestampFormat::new("%Y-%m-%d %H:%M:%S"),
            timestamp_col: "snap_time".to_string(),
            window_size: 20,
            step: TimeDelta::hours(1),
            std_kind: StdevKind::Sample,
            include_block_id: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdevFiles {
    pub stdev_file: FileConfig,
}

/// On-disk configuration of the rolling standard deviation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdevConfig {
    pub data: StdevFiles,

    pub output_file: FileConfig,

    #[serde(default)]
    pub calculation_params: CalculationParams,

    #[serde(default)]
    pub columns: StdevColumns,
}

impl StdevConfig {
    pub fn from_path(path: impl AsRef<Path>) -> FxPipeResult<Self> {
        let (mut cfg, base_dir): (Self, _) = load_json(path.as_ref())?;
        cfg.data.stdev_file.resolve(&base_dir);
        cfg.output_file.resolve(&base_dir);
        Ok(cfg)
    }

    pub fn settings(&self) -> FxPipeResult<StdevSettings> {
        let params = &self.calculation_params;
        let start = parse_bound(&params.date_format, &params.start_calc)?;
        let end = parse_bound(&params.date_format, &params.end_calc)?;

        StdevSettings::default()
            .with_columns(self.columns.clone(), &params.timestamp_col)
            .with_timestamp_format(params.date_format.clone())
            .with_range(start, end)
            .with_window_size(params.window_size)
            .with_step(params.step)
            .with_std_kind(params.std_kind)
            .with_block_id(params.include_block_id)
            .validated()
    }
}

/// Resolved, immutable settings of the rolling standard deviation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StdevSettings {
    pub columns: StdevColumns,
    pub timestamp_col: String,
    pub timestamp_format: TimestampFormat,
    /// Inclusive output range.
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub window_size: usize,
    /// Expected spacing between consecutive observations of one entity.
    pub step: TimeDelta,
    pub std_kind: StdevKind,
    pub include_block_id: bool,
}

impl Default for StdevSettings {
    fn default() -> Self {
        let params = CalculationParams::default();
        let fmt = params.date_format.clone();
        Self {
            columns: StdevColumns::default(),
            timestamp_col: params.timestamp_col,
            // Defaults are literals matching `fmt`, so parsing cannot fail.
            start: fmt.parse(&params.start_calc).unwrap_or_default(),
            end: fmt.parse(&params.end_calc).unwrap_or_default(),
            timestamp_format: fmt,
            window_size: params.window_size,
            step: params.step,
            std_kind: params.std_kind,
            include_block_id: params.include_block_id,
        }
    }
}

impl StdevSettings {
    pub fn with_columns(self, columns: StdevColumns, timestamp_col: &str) -> Self {
        Self {
            columns,
            timestamp_col: timestamp_col.to_string(),
            ..self
        }
    }

    pub fn with_timestamp_format(self, timestamp_format: TimestampFormat) -> Self {
        Self {
            timestamp_format,
            ..self
        }
    }

    pub fn with_range(self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end, ..self }
    }

    pub fn with_window_size(self, window_size: usize) -> Self {
        Self {
            window_size,
            ..self
        }
    }

    pub fn with_step(self, step: TimeDelta) -> Self {
        Self { step, ..self }
    }

    pub fn with_std_kind(self, std_kind: StdevKind) -> Self {
        Self { std_kind, ..self }
    }

    pub fn with_block_id(self, include_block_id: bool) -> Self {
        Self {
            include_block_id,
            ..self
        }
    }

    /// First timestamp loaded for computation: `start` minus `window_size` steps.
    ///
    /// Observations between this point and `start` only feed the edge windows
    /// and are dropped from the output.
    pub fn lookback_start(&self) -> NaiveDateTime {
        let padding = i32::try_from(self.window_size)
            .ok()
            .and_then(|w| self.step.checked_mul(w))
            .unwrap_or(TimeDelta::MAX);
        self.start
            .checked_sub_signed(padding)
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Checks the invariants the calculator relies on.
    ///
    /// # Errors
    /// - `window_size` is zero, or one with [`StdevKind::Sample`].
    /// - `step` is not strictly positive.
    /// - `start` is after `end`.
    pub fn validated(self) -> FxPipeResult<Self> {
        if self.window_size == 0 {
            return Err(ConfigError::InvalidWindowSize {
                size: 0,
                msg: "window size must be at least 1".to_string(),
            }
            .into());
        }
        if self.window_size <= self.std_kind.ddof() {
            return Err(ConfigError::InvalidWindowSize {
                size: self.window_size,
                msg: format!("{} standard deviation needs at least 2 observations", self.std_kind),
            }
            .into());
        }
        if self.step <= TimeDelta::zero() {
            return Err(ConfigError::InvalidDuration {
                value: self.step.to_string(),
                msg: "step must be strictly positive".to_string(),
            }
            .into());
        }
        if self.start > self.end {
            return Err(ConfigError::InvalidRange {
                start: self.start.to_string(),
                end: self.end.to_string(),
            }
            .into());
        }
        Ok(self)
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn load_json<T: DeserializeOwned>(path: &Path) -> FxPipeResult<(T, PathBuf)> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    let cfg = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })?;

    let base_dir = fs::canonicalize(path)
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .or_else(|| path.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    tracing::debug!(config = %path.display(), base_dir = %base_dir.display(), "Config loaded");
    Ok((cfg, base_dir))
}

/// Parses a range bound with the configured pattern, then with the common ISO-like forms.
fn parse_bound(fmt: &TimestampFormat, value: &str) -> FxPipeResult<NaiveDateTime> {
    [
        fmt.clone(),
        TimestampFormat::new("%Y-%m-%d %H:%M:%S%.f"),
        TimestampFormat::new("%Y-%m-%dT%H:%M:%S%.f"),
        TimestampFormat::new("%Y-%m-%d"),
    ]
    .iter()
    .find_map(|f| f.parse(value))
    .map_or_else(|| fmt.parse_setting(value), Ok)
}

fn default_rate_timestamp_format() -> TimestampFormat {
    TimestampFormat::new("%Y-%m-%d %H:%M:%S.%f")
}

fn default_tolerance() -> TimeDelta {
    TimeDelta::hours(1)
}

/// (De)serializes a [`TimeDelta`] as a human-readable duration such as `"1h"` or `"90m"`.
mod humantime_delta {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        let std = value.to_std().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&humantime::format_duration(std).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let std = humantime::parse_duration(&raw).map_err(D::Error::custom)?;
        TimeDelta::from_std(std).map_err(D::Error::custom)
    }
}
