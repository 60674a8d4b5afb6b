use chrono::NaiveDateTime;
use polars::prelude::{Column, DataFrame, DataType, IntoColumn, NamedFrom, Series, TimeUnit};

use crate::{
    data::{
        key::EntityKey,
        timestamp::{TimestampFormat, from_physical, to_micros},
    },
    error::{DataError, FxPipeResult, polars_to_fxpipe_error},
};

/// Typed, row-aligned accessors over the columns of a loaded table.
///
/// Every accessor returns one entry per row, in row order, with `None` for
/// nulls. Values that cannot be represented at all (an unparsable timestamp,
/// a list column where a number is expected) are fatal input errors.
pub trait TableExt {
    /// Fails with [`DataError::MissingColumn`] for the first absent column.
    fn require_columns(&self, table: &str, columns: &[&str]) -> FxPipeResult<()>;

    fn timestamps(
        &self,
        column: &str,
        format: &TimestampFormat,
    ) -> FxPipeResult<Vec<Option<NaiveDateTime>>>;

    fn entity_keys(&self, column: &str) -> FxPipeResult<Vec<Option<EntityKey>>>;

    fn floats(&self, column: &str) -> FxPipeResult<Vec<Option<f64>>>;

    /// Reads a boolean-like column. Unrecognised values become `None`.
    fn flags(&self, column: &str) -> FxPipeResult<Vec<Option<bool>>>;
}

impl TableExt for DataFrame {
    fn require_columns(&self, table: &str, columns: &[&str]) -> FxPipeResult<()> {
        let names = self.get_column_names();
        match columns
            .iter()
            .find(|c| !names.iter().any(|n| n.as_str() == **c))
        {
            Some(missing) => Err(DataError::MissingColumn {
                table: table.to_string(),
                column: missing.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn timestamps(
        &self,
        column: &str,
        format: &TimestampFormat,
    ) -> FxPipeResult<Vec<Option<NaiveDateTime>>> {
        let c = get(self, column)?;
        match c.dtype() {
            DataType::String => {
                let ca = c
                    .str()
                    .map_err(|e| polars_to_fxpipe_error("reading timestamps", e))?;
                ca.into_iter()
                    .enumerate()
                    .map(|(row, value)| match value {
                        None => Ok(None),
                        Some(s) => format.parse(s).map(Some).ok_or_else(|| {
                            DataError::TimestampConversion {
                                column: column.to_string(),
                                row,
                                value: s.to_string(),
                                format: format.pattern().to_string(),
                            }
                            .into()
                        }),
                    })
                    .collect()
            }
            DataType::Datetime(_, _) => datetime_values(c),
            DataType::Date => {
                let casted = c
                    .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
                    .map_err(|e| polars_to_fxpipe_error("casting date column", e))?;
                datetime_values(&casted)
            }
            other => Err(DataError::UnsupportedColumnType {
                column: column.to_string(),
                dtype: other.to_string(),
                msg: "expected a string, date or datetime column".to_string(),
            }
            .into()),
        }
    }

    fn entity_keys(&self, column: &str) -> FxPipeResult<Vec<Option<EntityKey>>> {
        let c = get(self, column)?;
        if c.dtype().is_integer() {
            let casted = c
                .cast(&DataType::Int64)
                .map_err(|e| polars_to_fxpipe_error("casting integer keys", e))?;
            let ca = casted
                .i64()
                .map_err(|e| polars_to_fxpipe_error("reading integer keys", e))?;
            return Ok(ca.into_iter().map(|v| v.map(EntityKey::Int)).collect());
        }

        let casted = c
            .cast(&DataType::String)
            .map_err(|e| polars_to_fxpipe_error("casting keys to string", e))?;
        let ca = casted
            .str()
            .map_err(|e| polars_to_fxpipe_error("reading string keys", e))?;
        Ok(ca.into_iter().map(|v| v.map(EntityKey::from)).collect())
    }

    fn floats(&self, column: &str) -> FxPipeResult<Vec<Option<f64>>> {
        let c = get(self, column)?;
        if !(c.dtype().is_float() || c.dtype().is_integer() || c.dtype() == &DataType::String) {
            return Err(DataError::UnsupportedColumnType {
                column: column.to_string(),
                dtype: c.dtype().to_string(),
                msg: "expected a numeric column".to_string(),
            }
            .into());
        }
        let casted = c
            .cast(&DataType::Float64)
            .map_err(|e| polars_to_fxpipe_error("casting to float", e))?;
        let ca = casted
            .f64()
            .map_err(|e| polars_to_fxpipe_error("reading floats", e))?;
        Ok(ca.into_iter().collect())
    }

    fn flags(&self, column: &str) -> FxPipeResult<Vec<Option<bool>>> {
        let c = get(self, column)?;
        match c.dtype() {
            DataType::Boolean => {
                let ca = c
                    .bool()
                    .map_err(|e| polars_to_fxpipe_error("reading flags", e))?;
                Ok(ca.into_iter().collect())
            }
            DataType::String => {
                let ca = c
                    .str()
                    .map_err(|e| polars_to_fxpipe_error("reading flags", e))?;
                Ok(ca.into_iter().map(|v| v.and_then(parse_flag)).collect())
            }
            DataType::Null => Ok(vec![None; c.len()]),
            dtype if dtype.is_integer() || dtype.is_float() => Ok(self
                .floats(column)?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()).map(|x| x != 0.0))
                .collect()),
            other => Err(DataError::UnsupportedColumnType {
                column: column.to_string(),
                dtype: other.to_string(),
                msg: "expected a boolean-like column".to_string(),
            }
            .into()),
        }
    }
}

// ================================================================================================
// Column Builders
// ================================================================================================

pub(crate) fn datetime_column(
    name: &str,
    values: &[Option<NaiveDateTime>],
) -> FxPipeResult<Column> {
    let micros: Vec<Option<i64>> = values.iter().copied().map(|ts| ts.map(to_micros)).collect();
    Series::new(name.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
        .map(IntoColumn::into_column)
        .map_err(|e| polars_to_fxpipe_error("building datetime column", e))
}

pub(crate) fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::new(name.into(), values)
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn get<'a>(df: &'a DataFrame, column: &str) -> FxPipeResult<&'a Column> {
    df.column(column)
        .map_err(|e| polars_to_fxpipe_error(&format!("looking up column '{column}'"), e))
}

fn datetime_values(c: &Column) -> FxPipeResult<Vec<Option<NaiveDateTime>>> {
    let ca = c
        .datetime()
        .map_err(|e| polars_to_fxpipe_error("reading datetimes", e))?;
    let unit = ca.time_unit();
    Ok(ca
        .physical()
        .into_iter()
        .map(|v| v.and_then(|v| from_physical(v, unit)))
        .collect())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}
