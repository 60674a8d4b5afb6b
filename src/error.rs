use thiserror::Error;

pub type FxPipeResult<T> = Result<T, FxPipeError>;

#[derive(Debug, Error)]
pub enum FxPipeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors raised while loading or validating run settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid duration '{value}': {msg}")]
    InvalidDuration { value: String, msg: String },

    #[error("Invalid timestamp '{value}' for format '{format}'")]
    InvalidTimestamp { value: String, format: String },

    #[error("Invalid calculation range (start: {start}, end: {end}): start must not be after end")]
    InvalidRange { start: String, end: String },

    #[error("Invalid window size {size}: {msg}")]
    InvalidWindowSize { size: usize, msg: String },

    #[error("Unsupported file type for {table}: '{format}' ({msg})")]
    UnsupportedFileType {
        table: String,
        format: String,
        msg: String,
    },

    #[error("Invalid read option: {0}")]
    InvalidReadOption(String),
}

/// Errors related to table contents: schemas, column types, values.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Missing required column '{column}' in {table} table")]
    MissingColumn { table: String, column: String },

    #[error("Column '{column}' has unsupported type {dtype}: {msg}")]
    UnsupportedColumnType {
        column: String,
        dtype: String,
        msg: String,
    },

    #[error("Failed timestamp conversion in column '{column}' at row {row}: '{value}' does not match '{format}'")]
    TimestampConversion {
        column: String,
        row: usize,
        value: String,
        format: String,
    },

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

/// Errors related to reading and writing tables on disk.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Failed to read table from '{path}': {msg}")]
    ReadFailed { path: String, msg: String },

    #[error("Failed to write table to '{path}': {msg}")]
    WriteFailed { path: String, msg: String },

    #[error("Failed to set up logging: {0}")]
    Logging(String),
}

pub(crate) fn polars_to_fxpipe_error(stage: &str, e: polars::error::PolarsError) -> FxPipeError {
    FxPipeError::Data(DataError::DataFrame(format!("Error while {stage}: {e}")))
}
