use polars::{
    frame::DataFrame,
    prelude::{Column, NamedFrom, PlSmallStr},
};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    config::{ConversionSettings, RateConfig},
    conversion::{
        joiner::join_backward,
        record::{PriceRecord, SpotRecord},
        rule::RuleBook,
        status::ConversionStatus,
        transformer::new_prices,
    },
    data::frame::{TableExt, datetime_column, float_column},
    error::{FxPipeResult, polars_to_fxpipe_error},
    io::{Table, ToFile, read_table},
};

/// Columns appended to the price table by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConvertedCol {
    ConversionStatus,
    NewPrice,
}

impl From<ConvertedCol> for PlSmallStr {
    fn from(value: ConvertedCol) -> Self {
        value.as_str().into()
    }
}

impl ConvertedCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Per-run counters, logged at the end of a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub rows: usize,
    pub no_conversion_required: usize,
    pub conversion_done: usize,
    pub conversion_failed_no_spot_rate: usize,
    /// Matches where several spot records of the pair shared the matched timestamp.
    pub ambiguous_matches: usize,
    /// Rule rows ignored because their pair already had a rule.
    pub duplicate_rules: usize,
    /// Spot rows without a pair or timestamp.
    pub dropped_spots: usize,
}

impl ConversionSummary {
    fn count(&mut self, status: ConversionStatus) {
        match status {
            ConversionStatus::NoConversionRequired => self.no_conversion_required += 1,
            ConversionStatus::ConversionDone => self.conversion_done += 1,
            ConversionStatus::ConversionFailedNoSpotRate => {
                self.conversion_failed_no_spot_rate += 1
            }
        }
    }
}

/// The price table with its conversion outcome, in the original row order.
#[derive(Debug, Clone)]
pub struct ConvertedPrices {
    df: DataFrame,
    summary: ConversionSummary,
    datetime_format: String,
}

impl ConvertedPrices {
    pub fn summary(&self) -> &ConversionSummary {
        &self.summary
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }
}

impl Table for ConvertedPrices {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn datetime_format(&self) -> Option<&str> {
        Some(&self.datetime_format)
    }
}

/// Converts a price table using conversion rules and spot rates.
#[derive(Debug, Clone, Default)]
pub struct PriceConverter {
    settings: ConversionSettings,
}

impl PriceConverter {
    pub fn new(settings: ConversionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// Runs merge, join, classification and pricing over the three tables.
    ///
    /// The output holds every column of `prices` (timestamps normalized to
    /// datetimes) followed by the merged `convert_price` and
    /// `conversion_factor`, the matched spot rate, `conversion_status` and
    /// `new_price`.
    ///
    /// # Errors
    /// Missing columns, unparsable timestamps and unsupported column types.
    #[tracing::instrument(skip_all, fields(prices = prices.height(), spots = spots.height()))]
    pub fn convert(
        &self,
        rules: &DataFrame,
        prices: &DataFrame,
        spots: &DataFrame,
    ) -> FxPipeResult<ConvertedPrices> {
        let cols = &self.settings.columns;
        rules.require_columns(
            "conversion rules",
            &[
                cols.ccy_pair.as_str(),
                cols.convert_price.as_str(),
                cols.conversion_factor.as_str(),
            ],
        )?;
        prices.require_columns(
            "price",
            &[cols.timestamp.as_str(), cols.price.as_str(), cols.ccy_pair.as_str()],
        )?;
        spots.require_columns(
            "spot",
            &[cols.timestamp.as_str(), cols.ccy_pair.as_str(), cols.spot_rate.as_str()],
        )?;

        let book = self.rule_book(rules)?;
        let records = self.price_records(prices, &book)?;
        let (spot_records, dropped_spots) = self.spot_records(spots)?;

        tracing::debug!(pairs = book.pair_count(), "Conversion rules loaded");
        if book.duplicates() > 0 {
            tracing::warn!(
                duplicates = book.duplicates(),
                "Duplicate conversion rules found; the first rule per pair is used"
            );
        }
        if dropped_spots > 0 {
            tracing::warn!(dropped = dropped_spots, "Spot rows without pair or timestamp ignored");
        }

        let outcome = join_backward(&records, &spot_records, self.settings.tolerance);
        if outcome.ambiguous > 0 {
            tracing::warn!(
                ambiguous = outcome.ambiguous,
                "Several spot rates share the matched timestamp; the last one in input order was used"
            );
        }

        let spot_rates = outcome.spot_rates(&spot_records);
        let statuses: Vec<ConversionStatus> = records
            .iter()
            .zip(&spot_rates)
            .map(|(r, &spot)| ConversionStatus::classify(r.requires_conversion, spot))
            .collect();

        let price_values: Vec<f64> = records.iter().map(|r| r.price).collect();
        let factors: Vec<Option<f64>> = records.iter().map(|r| r.conversion_factor).collect();
        let converted = new_prices(&price_values, &factors, &spot_rates, &statuses);

        let mut summary = ConversionSummary {
            rows: records.len(),
            ambiguous_matches: outcome.ambiguous,
            duplicate_rules: book.duplicates(),
            dropped_spots,
            ..ConversionSummary::default()
        };
        statuses.iter().for_each(|s| summary.count(*s));

        let timestamps: Vec<_> = records.iter().map(|r| r.timestamp).collect();
        let flags: Vec<bool> = records.iter().map(|r| r.requires_conversion).collect();
        let mut df = prices.clone();
        let new_columns = [
            datetime_column(&cols.timestamp, &timestamps)?,
            Column::new(cols.convert_price.as_str().into(), flags),
            float_column(&cols.conversion_factor, factors),
            float_column(&cols.spot_rate, spot_rates),
            Column::new(
                ConvertedCol::ConversionStatus.into(),
                statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            ),
            float_column(ConvertedCol::NewPrice.as_str(), converted),
        ];
        for column in new_columns {
            df.with_column(column)
                .map_err(|e| polars_to_fxpipe_error("appending conversion columns", e))?;
        }

        tracing::info!(
            rows = summary.rows,
            done = summary.conversion_done,
            failed = summary.conversion_failed_no_spot_rate,
            unconverted = summary.no_conversion_required,
            "Price conversion finished"
        );

        Ok(ConvertedPrices {
            df,
            summary,
            datetime_format: self.settings.timestamp_format.pattern().to_string(),
        })
    }

    /// Builds the rule book from the conversion rules table.
    pub fn rule_book(&self, rules: &DataFrame) -> FxPipeResult<RuleBook> {
        let cols = &self.settings.columns;
        let keys = rules.entity_keys(&cols.ccy_pair)?;
        let flags = rules.flags(&cols.convert_price)?;
        let factors = rules.floats(&cols.conversion_factor)?;
        Ok(RuleBook::from_rows(
            keys.into_iter()
                .zip(flags)
                .zip(factors)
                .map(|((k, f), c)| (k, f, c)),
        ))
    }

    /// Reads the price table and merges each row with its pair's rule.
    pub fn price_records(
        &self,
        prices: &DataFrame,
        book: &RuleBook,
    ) -> FxPipeResult<Vec<PriceRecord>> {
        let cols = &self.settings.columns;
        let timestamps = prices.timestamps(&cols.timestamp, &self.settings.timestamp_format)?;
        let keys = prices.entity_keys(&cols.ccy_pair)?;
        let values = prices.floats(&cols.price)?;

        Ok(timestamps
            .into_iter()
            .zip(keys)
            .zip(values)
            .map(|((timestamp, ccy_pair), price)| {
                let rule = book.lookup(ccy_pair.as_ref());
                PriceRecord {
                    timestamp,
                    ccy_pair,
                    price: price.unwrap_or(f64::NAN),
                    requires_conversion: rule.requires_conversion,
                    conversion_factor: rule.conversion_factor,
                }
            })
            .collect())
    }

    /// Reads the spot table, returning usable records and the number of rows dropped.
    pub fn spot_records(&self, spots: &DataFrame) -> FxPipeResult<(Vec<SpotRecord>, usize)> {
        let cols = &self.settings.columns;
        let timestamps = spots.timestamps(&cols.timestamp, &self.settings.timestamp_format)?;
        let keys = spots.entity_keys(&cols.ccy_pair)?;
        let rates = spots.floats(&cols.spot_rate)?;

        let total = timestamps.len();
        let records: Vec<SpotRecord> = timestamps
            .into_iter()
            .zip(keys)
            .zip(rates)
            .filter_map(|((ts, key), rate)| {
                Some(SpotRecord {
                    timestamp: ts?,
                    ccy_pair: key?,
                    rate,
                })
            })
            .collect();

        let dropped = total - records.len();
        Ok((records, dropped))
    }
}

/// Loads the three input tables, converts and writes the output table.
///
/// Nothing is written unless every step before the export succeeded.
pub fn run(config: &RateConfig) -> FxPipeResult<ConversionSummary> {
    let settings = config.settings()?;
    let rules = read_table(&config.data.ccy_file)?;
    let prices = read_table(&config.data.price_file)?;
    let spots = read_table(&config.data.spot_file)?;

    let converted = PriceConverter::new(settings).convert(&rules, &prices, &spots)?;
    converted.to_file(&config.output_file)?;
    Ok(*converted.summary())
}
