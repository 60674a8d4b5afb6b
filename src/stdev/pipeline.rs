use polars::{
    frame::DataFrame,
    prelude::{Column, IdxCa, IdxSize, NamedFrom, PlSmallStr},
};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    config::{StdevConfig, StdevSettings},
    data::frame::{TableExt, datetime_column, float_column},
    error::{ConfigError, FxPipeResult, polars_to_fxpipe_error},
    io::{FileFormat, Table, ToFile, read_table},
    stdev::{calculator::DispersionCalculator, observation::ObservationSet},
};

/// Columns appended to the observation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StdevCol {
    BidStdev,
    MidStdev,
    AskStdev,
    /// Only written when block ids are requested.
    ContigBlock,
}

impl From<StdevCol> for PlSmallStr {
    fn from(value: StdevCol) -> Self {
        value.as_str().into()
    }
}

impl StdevCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdevSummary {
    pub rows_loaded: usize,
    /// Rows without entity or timestamp.
    pub rows_dropped: usize,
    pub entities: usize,
    pub blocks: usize,
    /// Rows inside the output range.
    pub rows_written: usize,
}

/// Observations of the output range with their rolling statistics,
/// ordered by `(entity, timestamp)`.
#[derive(Debug, Clone)]
pub struct RollingStdevs {
    df: DataFrame,
    summary: StdevSummary,
    datetime_format: String,
}

impl RollingStdevs {
    pub fn summary(&self) -> &StdevSummary {
        &self.summary
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }
}

impl Table for RollingStdevs {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn datetime_format(&self) -> Option<&str> {
        Some(&self.datetime_format)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StdevPipeline {
    settings: StdevSettings,
}

impl StdevPipeline {
    pub fn new(settings: StdevSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StdevSettings {
        &self.settings
    }

    /// Computes rolling bid/mid/ask standard deviations of `observations`.
    ///
    /// Every source column is kept, with the timestamp column normalized to a
    /// datetime. Rows outside `[start, end]` are used as lookback only and are
    /// not part of the result.
    #[tracing::instrument(skip_all, fields(rows = observations.height()))]
    pub fn compute(&self, observations: &DataFrame) -> FxPipeResult<RollingStdevs> {
        let s = &self.settings;
        let cols = &s.columns;
        observations.require_columns(
            "observation",
            &[
                cols.security_id.as_str(),
                s.timestamp_col.as_str(),
                cols.bid.as_str(),
                cols.mid.as_str(),
                cols.ask.as_str(),
            ],
        )?;

        let set = ObservationSet::load(observations, s)?;
        if set.dropped > 0 {
            tracing::warn!(
                dropped = set.dropped,
                "Observations without entity or timestamp ignored"
            );
        }

        let partitions = set.partitions();
        let outcome = DispersionCalculator::from_settings(s).compute(&partitions);
        tracing::debug!(
            entities = outcome.entities,
            blocks = outcome.blocks,
            rows = outcome.rows.len(),
            "Rolling windows computed"
        );

        let kept: Vec<usize> = set
            .observations
            .iter()
            .enumerate()
            .filter(|(_, o)| o.timestamp >= s.start && o.timestamp <= s.end)
            .map(|(i, _)| i)
            .collect();

        let rows: Vec<IdxSize> = kept
            .iter()
            .map(|&i| set.observations[i].row as IdxSize)
            .collect();
        let mut df = observations
            .take(&IdxCa::from_vec("idx".into(), rows))
            .map_err(|e| polars_to_fxpipe_error("selecting output rows", e))?;

        let timestamps: Vec<_> = kept
            .iter()
            .map(|&i| Some(set.observations[i].timestamp))
            .collect();
        let stats: Vec<_> = kept.iter().map(|&i| outcome.rows[i]).collect();

        let mut new_columns = vec![
            datetime_column(&s.timestamp_col, &timestamps)?,
            float_column(
                StdevCol::BidStdev.as_str(),
                stats.iter().map(|r| r.bid).collect(),
            ),
            float_column(
                StdevCol::MidStdev.as_str(),
                stats.iter().map(|r| r.mid).collect(),
            ),
            float_column(
                StdevCol::AskStdev.as_str(),
                stats.iter().map(|r| r.ask).collect(),
            ),
        ];
        if s.include_block_id {
            new_columns.push(Column::new(
                StdevCol::ContigBlock.into(),
                stats.iter().map(|r| r.block_id).collect::<Vec<_>>(),
            ));
        }
        for column in new_columns {
            df.with_column(column)
                .map_err(|e| polars_to_fxpipe_error("appending stdev columns", e))?;
        }

        let summary = StdevSummary {
            rows_loaded: set.loaded,
            rows_dropped: set.dropped,
            entities: outcome.entities,
            blocks: outcome.blocks,
            rows_written: df.height(),
        };
        tracing::info!(
            entities = summary.entities,
            blocks = summary.blocks,
            rows = summary.rows_written,
            "Rolling standard deviation finished"
        );

        Ok(RollingStdevs {
            df,
            summary,
            datetime_format: s.timestamp_format.pattern().to_string(),
        })
    }
}

/// Loads the observation table, computes and writes the output table.
///
/// # Errors
/// The observation file must be parquet; any other type is rejected before
/// anything is read.
pub fn run(config: &StdevConfig) -> FxPipeResult<StdevSummary> {
    let input = &config.data.stdev_file;
    if input.format != FileFormat::Parquet {
        return Err(ConfigError::UnsupportedFileType {
            table: "stdev_file".to_string(),
            format: input.format.to_string(),
            msg: "observations must be read from parquet".to_string(),
        }
        .into());
    }

    let settings = config.settings()?;
    let observations = read_table(input)?;
    let result = StdevPipeline::new(settings).compute(&observations)?;
    result.to_file(&config.output_file)?;
    Ok(*result.summary())
}
