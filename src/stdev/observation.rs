use chrono::NaiveDateTime;
use itertools::izip;
use polars::frame::DataFrame;

use crate::{
    config::StdevSettings,
    data::{frame::TableExt, key::EntityKey},
    error::FxPipeResult,
};

/// One bid/mid/ask snapshot of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Row of the source table the observation was read from.
    pub row: usize,
    pub entity: EntityKey,
    pub timestamp: NaiveDateTime,
    pub bid: Option<f64>,
    pub mid: Option<f64>,
    pub ask: Option<f64>,
}

/// Observations ready for segmentation.
#[derive(Debug, Clone, Default)]
pub struct ObservationSet {
    /// Sorted by `(entity, timestamp)`, restricted to the lookback range.
    pub observations: Vec<Observation>,
    /// Rows read from the table.
    pub loaded: usize,
    /// Rows without entity or timestamp.
    pub dropped: usize,
}

impl ObservationSet {
    /// Reads, sorts and range-filters the observations of `df`.
    ///
    /// The sort is stable, so rows sharing `(entity, timestamp)` keep their
    /// table order. Rows before [`StdevSettings::lookback_start`] or after
    /// `end` are discarded.
    pub fn load(df: &DataFrame, settings: &StdevSettings) -> FxPipeResult<Self> {
        let cols = &settings.columns;
        let entities = df.entity_keys(&cols.security_id)?;
        let timestamps = df.timestamps(&settings.timestamp_col, &settings.timestamp_format)?;
        let bids = df.floats(&cols.bid)?;
        let mids = df.floats(&cols.mid)?;
        let asks = df.floats(&cols.ask)?;

        let loaded = df.height();
        let mut observations: Vec<Observation> = izip!(entities, timestamps, bids, mids, asks)
            .enumerate()
            .filter_map(|(row, (entity, timestamp, bid, mid, ask))| {
                Some(Observation {
                    row,
                    entity: entity?,
                    timestamp: timestamp?,
                    bid,
                    mid,
                    ask,
                })
            })
            .collect();
        let dropped = loaded - observations.len();

        observations.sort_by(|a, b| (&a.entity, a.timestamp).cmp(&(&b.entity, b.timestamp)));

        let from = settings.lookback_start();
        observations.retain(|o| o.timestamp >= from && o.timestamp <= settings.end);

        Ok(Self {
            observations,
            loaded,
            dropped,
        })
    }

    /// Consecutive runs of one entity each.
    pub fn partitions(&self) -> Vec<&[Observation]> {
        self.observations
            .chunk_by(|a, b| a.entity == b.entity)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use polars::df;

    use super::*;

    fn settings() -> StdevSettings {
        let fmt = crate::data::timestamp::TimestampFormat::new("%Y-%m-%d %H:%M:%S");
        let start = fmt.parse("2021-11-20 05:00:00").expect("valid start");
        let end = fmt.parse("2021-11-20 08:00:00").expect("valid end");
        StdevSettings::default()
            .with_range(start, end)
            .with_window_size(2)
            .with_step(TimeDelta::hours(1))
    }

    #[test]
    fn test_load_sorts_filters_and_drops_incomplete_rows() {
        let df = df!(
            "security_id" => [Some(2i64), Some(1), Some(1), None, Some(1), Some(10)],
            "snap_time" => [
                Some("2021-11-20 06:00:00"),
                Some("2021-11-20 07:00:00"),
                Some("2021-11-20 02:00:00"),
                Some("2021-11-20 06:00:00"),
                Some("2021-11-20 04:00:00"),
                None
            ],
            "bid" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "mid" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "ask" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        )
        .expect("Failed to create observation DF");

        let set = ObservationSet::load(&df, &settings()).expect("load succeeds");

        assert_eq!(set.loaded, 6);
        assert_eq!(set.dropped, 2);
        // Lookback is two hours before 05:00, so 02:00 is gone and 04:00 stays.
        let rows: Vec<_> = set.observations.iter().map(|o| o.row).collect();
        assert_eq!(rows, vec![4, 1, 0]);

        let parts = set.partitions();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1][0].entity, EntityKey::Int(2));
    }

    #[test]
    fn test_numeric_entity_order_is_numeric() {
        let df = df!(
            "security_id" => [10i64, 9],
            "snap_time" => ["2021-11-20 06:00:00", "2021-11-20 06:00:00"],
            "bid" => [1.0, 2.0],
            "mid" => [1.0, 2.0],
            "ask" => [1.0, 2.0]
        )
        .expect("Failed to create observation DF");

        let set = ObservationSet::load(&df, &settings()).expect("load succeeds");
        let entities: Vec<_> = set.observations.iter().map(|o| o.entity.clone()).collect();
        assert_eq!(entities, vec![EntityKey::Int(9), EntityKey::Int(10)]);
    }
}
