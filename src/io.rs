use std::{fs, path::Path};

use polars::{
    frame::DataFrame,
    prelude::{
        CsvWriterOptions, IntoLazy, LazyCsvReader, LazyFileListReader, LazyFrame,
        ParquetWriteOptions, PlPath, ScanArgsParquet, SinkOptions, SinkTarget, col,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    config::{FileConfig, ReadArgs},
    error::{ConfigError, DataError, FxPipeResult, IoError},
};

// ================================================================================================
// File Formats
// ================================================================================================

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Csv,
    Parquet,
}

// ================================================================================================
// Traits
// ================================================================================================

/// A computed output table backed by a `DataFrame`.
pub trait Table {
    fn as_df(&self) -> &DataFrame;

    /// Pattern used for datetime columns when the table is written as CSV.
    fn datetime_format(&self) -> Option<&str> {
        None
    }
}

pub trait ToFile {
    /// Writes the table to the location and format described by `cfg`.
    ///
    /// # Side Effects
    /// - Creates the parent directory if missing.
    /// - Overwrites the file if it exists.
    fn to_file(&self, cfg: &FileConfig) -> FxPipeResult<()>;
}

impl<T> ToFile for T
where
    T: Table,
{
    fn to_file(&self, cfg: &FileConfig) -> FxPipeResult<()> {
        write_table(self.as_df(), cfg, self.datetime_format())
    }
}

// ================================================================================================
// Reading
// ================================================================================================

/// Reads a whole table into memory.
pub fn read_table(cfg: &FileConfig) -> FxPipeResult<DataFrame> {
    let uri = path_str(&cfg.path)?;
    if !cfg.path.exists() {
        return Err(IoError::ReadFailed {
            path: uri.to_string(),
            msg: "file does not exist".to_string(),
        }
        .into());
    }

    let lf = match cfg.format {
        FileFormat::Csv => scan_csv(uri, &cfg.read_args)?,
        FileFormat::Parquet => {
            LazyFrame::scan_parquet(PlPath::new(uri), ScanArgsParquet::default()).map_err(|e| {
                IoError::ReadFailed {
                    path: uri.to_string(),
                    msg: e.to_string(),
                }
            })?
        }
    };

    let lf = match &cfg.read_args.columns {
        Some(columns) => lf.select(columns.iter().map(|c| col(c.as_str())).collect::<Vec<_>>()),
        None => lf,
    };

    let df = lf.collect().map_err(|e| IoError::ReadFailed {
        path: uri.to_string(),
        msg: e.to_string(),
    })?;

    tracing::debug!(path = uri, rows = df.height(), cols = df.width(), "Table loaded");
    Ok(df)
}

fn scan_csv(uri: &str, args: &ReadArgs) -> FxPipeResult<LazyFrame> {
    let mut reader = LazyCsvReader::new(PlPath::new(uri))
        .with_has_header(args.has_header.unwrap_or(true))
        .with_try_parse_dates(false);

    if let Some(sep) = args.separator_byte()? {
        reader = reader.with_separator(sep);
    }
    if let Some(skip) = args.skip_rows {
        reader = reader.with_skip_rows(skip);
    }

    reader.finish().map_err(|e| {
        IoError::ReadFailed {
            path: uri.to_string(),
            msg: e.to_string(),
        }
        .into()
    })
}

// ================================================================================================
// Writing
// ================================================================================================

/// Writes `df` to the location and format described by `cfg`.
pub fn write_table(
    df: &DataFrame,
    cfg: &FileConfig,
    datetime_format: Option<&str>,
) -> FxPipeResult<()> {
    if let Some(dir) = cfg.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                IoError::FileSystem(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
    }

    let uri = path_str(&cfg.path)?;
    let target = SinkTarget::Path(PlPath::new(uri));
    let sink_opts = SinkOptions::default();
    let lf = df.clone().lazy();

    let sink_plan = match cfg.format {
        FileFormat::Csv => {
            let mut options = CsvWriterOptions::default();
            options.include_header = cfg.read_args.has_header.unwrap_or(true);
            if let Some(sep) = cfg.read_args.separator_byte()? {
                options.serialize_options.separator = sep;
            }
            if let Some(fmt) = datetime_format {
                options.serialize_options.datetime_format = Some(fmt.to_string());
            }
            lf.sink_csv(target, options, None, sink_opts)
                .map_err(|e| DataError::DataFrame(format!("Failed to build CSV sink plan: {e}")))?
        }
        FileFormat::Parquet => lf
            .sink_parquet(target, ParquetWriteOptions::default(), None, sink_opts)
            .map_err(|e| {
                DataError::DataFrame(format!("Failed to build Parquet sink plan: {e}"))
            })?,
    };

    let _ = sink_plan.collect().map_err(|e| IoError::WriteFailed {
        path: uri.to_string(),
        msg: e.to_string(),
    })?;

    tracing::info!(path = uri, rows = df.height(), format = %cfg.format, "Table written");
    Ok(())
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn path_str(path: &Path) -> FxPipeResult<&str> {
    path.to_str().ok_or_else(|| {
        IoError::FileSystem(format!(
            "Path contains invalid UTF-8 characters: {}",
            path.display()
        ))
        .into()
    })
}

impl ReadArgs {
    pub(crate) fn separator_byte(&self) -> FxPipeResult<Option<u8>> {
        match self.separator {
            None => Ok(None),
            Some(c) if c.is_ascii() => Ok(Some(c as u8)),
            Some(c) => Err(ConfigError::InvalidReadOption(format!(
                "separator '{c}' is not a single ASCII character"
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, str::FromStr};

    use polars::df;

    use super::*;
    use crate::data::frame::TableExt;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fxpipe-io-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_file_format_from_str() {
        assert_eq!(FileFormat::from_str("csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_str("parquet").unwrap(), FileFormat::Parquet);
        assert!(FileFormat::from_str("xlsx").is_err());
        assert_eq!(FileFormat::Parquet.to_string(), "parquet");
    }

    #[test]
    fn test_non_ascii_separator_rejected() {
        let args = ReadArgs {
            separator: Some('§'),
            ..ReadArgs::default()
        };
        assert!(args.separator_byte().is_err());

        let args = ReadArgs {
            separator: Some(';'),
            ..ReadArgs::default()
        };
        assert_eq!(args.separator_byte().unwrap(), Some(b';'));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let cfg = FileConfig::new(scratch_dir("missing").join("nope.csv"), FileFormat::Csv);
        let err = read_table(&cfg).unwrap_err();
        assert!(err.to_string().contains("nope.csv"));
    }

    #[test]
    fn test_csv_write_then_read_with_separator() {
        let dir = scratch_dir("csv");
        let mut cfg = FileConfig::new(dir.join("nested/out.csv"), FileFormat::Csv);
        cfg.read_args.separator = Some(';');

        let df = df!("ccy_pair" => ["EURUSD", "GBPUSD"], "price" => [1.5, 2.5])
            .expect("Failed to create DF");
        write_table(&df, &cfg, None).expect("write csv");

        let have = read_table(&cfg).expect("read csv");
        assert_eq!(have.height(), 2);
        assert_eq!(
            have.floats("price").expect("price column"),
            vec![Some(1.5), Some(2.5)]
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_parquet_write_then_read_selected_columns() {
        let dir = scratch_dir("parquet");
        let mut cfg = FileConfig::new(dir.join("obs.parquet"), FileFormat::Parquet);

        let df = df!("security_id" => [1i64, 2], "bid" => [1.0, 2.0], "ask" => [1.1, 2.1])
            .expect("Failed to create DF");
        write_table(&df, &cfg, None).expect("write parquet");

        cfg.read_args.columns = Some(vec!["security_id".to_string(), "ask".to_string()]);
        let have = read_table(&cfg).expect("read parquet");
        assert_eq!(have.width(), 2);
        assert!(have.require_columns("obs", &["security_id", "ask"]).is_ok());
        assert!(have.require_columns("obs", &["bid"]).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
