use chrono::TimeDelta;
use rayon::prelude::*;

use crate::{
    config::{StdevKind, StdevSettings},
    stdev::{
        observation::Observation,
        rolling::{RollingStatistic, StreamingStdev},
        segmenter::{block_count, block_ids},
    },
};

/// Rolling statistics of one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdevRow {
    /// Source table row, copied from [`Observation::row`].
    pub row: usize,
    pub block_id: u32,
    pub bid: Option<f64>,
    pub mid: Option<f64>,
    pub ask: Option<f64>,
}

/// Output of [`DispersionCalculator::compute`], aligned with its input.
#[derive(Debug, Clone, Default)]
pub struct DispersionOutcome {
    pub rows: Vec<StdevRow>,
    pub entities: usize,
    pub blocks: usize,
}

/// Computes bid/mid/ask rolling standard deviations per entity and block.
#[derive(Debug, Clone, Copy)]
pub struct DispersionCalculator {
    window_size: usize,
    step: TimeDelta,
    std_kind: StdevKind,
}

impl DispersionCalculator {
    pub fn new(window_size: usize, step: TimeDelta, std_kind: StdevKind) -> Self {
        Self {
            window_size,
            step,
            std_kind,
        }
    }

    pub fn from_settings(settings: &StdevSettings) -> Self {
        Self::new(settings.window_size, settings.step, settings.std_kind)
    }

    /// Processes entity partitions in parallel.
    ///
    /// Each partition must hold the observations of one entity sorted by
    /// timestamp. Results come back in partition order.
    pub fn compute(&self, partitions: &[&[Observation]]) -> DispersionOutcome {
        let per_entity: Vec<(Vec<StdevRow>, usize)> = partitions
            .par_iter()
            .map(|obs| self.compute_entity(obs))
            .collect();

        let blocks = per_entity.iter().map(|(_, b)| b).sum();
        let rows = per_entity.into_iter().flat_map(|(rows, _)| rows).collect();
        DispersionOutcome {
            rows,
            entities: partitions.len(),
            blocks,
        }
    }

    /// One entity: segments into blocks, restarting the windows at every block.
    pub fn compute_entity(&self, observations: &[Observation]) -> (Vec<StdevRow>, usize) {
        let timestamps: Vec<_> = observations.iter().map(|o| o.timestamp).collect();
        let ids = block_ids(&timestamps, self.step);

        let ddof = self.std_kind.ddof();
        let mut bid = StreamingStdev::new(self.window_size, ddof);
        let mut mid = StreamingStdev::new(self.window_size, ddof);
        let mut ask = StreamingStdev::new(self.window_size, ddof);

        let mut current = None;
        let rows = observations
            .iter()
            .zip(&ids)
            .map(|(o, &block_id)| {
                if current != Some(block_id) {
                    bid.reset();
                    mid.reset();
                    ask.reset();
                    current = Some(block_id);
                }
                StdevRow {
                    row: o.row,
                    block_id,
                    bid: bid.update(o.bid),
                    mid: mid.update(o.mid),
                    ask: ask.update(o.ask),
                }
            })
            .collect();

        (rows, block_count(&ids))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::data::key::EntityKey;

    fn at(h: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 11, 20)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid base")
            + TimeDelta::hours(h)
    }

    fn series(entity: i64, hours: impl IntoIterator<Item = i64>) -> Vec<Observation> {
        hours
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                let x = 1.0 + (i % 7) as f64 * 0.01;
                Observation {
                    row: i,
                    entity: EntityKey::Int(entity),
                    timestamp: at(h),
                    bid: Some(x),
                    mid: Some(x + 0.005),
                    ask: Some(x + 0.01),
                }
            })
            .collect()
    }

    fn calculator(window: usize) -> DispersionCalculator {
        DispersionCalculator::new(window, TimeDelta::hours(1), StdevKind::Sample)
    }

    #[test]
    fn test_first_value_at_twentieth_observation() {
        let obs = series(1, 0..24);
        let (rows, blocks) = calculator(20).compute_entity(&obs);

        assert_eq!(blocks, 1);
        assert!(rows[..19].iter().all(|r| r.bid.is_none()));
        assert!(rows[19..].iter().all(|r| r.bid.is_some() && r.ask.is_some()));
        assert_eq!(obs[19].timestamp, at(19));
    }

    #[test]
    fn test_gap_restarts_window() {
        // Two-hour gap between the 5th and 6th observation.
        let hours = (0..5).chain(6..30);
        let obs = series(1, hours);
        let (rows, blocks) = calculator(20).compute_entity(&obs);

        assert_eq!(blocks, 2);
        assert!(rows[..5].iter().all(|r| r.block_id == 1));
        assert!(rows[5..].iter().all(|r| r.block_id == 2));
        // The second block needs 20 observations of its own: positions 5..=24.
        assert!(rows[..24].iter().all(|r| r.mid.is_none()));
        assert!(rows[24].mid.is_some());
    }

    #[test]
    fn test_entities_do_not_leak_into_each_other() {
        let a = series(1, 0..10);
        let b = series(2, 10..13);
        let outcome = calculator(3).compute(&[a.as_slice(), b.as_slice()]);

        assert_eq!(outcome.entities, 2);
        assert_eq!(outcome.blocks, 2);
        assert_eq!(outcome.rows.len(), 13);
        // Entity 2 starts fresh even though its hours continue entity 1's.
        assert!(outcome.rows[10..12].iter().all(|r| r.bid.is_none()));
        assert!(outcome.rows[12].bid.is_some());
        assert_eq!(outcome.rows[12].block_id, 1);
    }

    #[test]
    fn test_spike_inside_block_does_not_zero_later_windows() {
        let mut obs = series(1, 0..12);
        for (i, o) in obs.iter_mut().enumerate() {
            o.bid = Some(1.1 + (i % 3) as f64 * 1e-4);
        }
        obs[5].bid = Some(1e7);
        let (rows, blocks) = calculator(3).compute_entity(&obs);

        assert_eq!(blocks, 1);
        assert!(rows[5..8].iter().all(|r| r.bid.is_some_and(|v| v > 1e6)));
        // Windows after the spike hold 1.1, 1.1001 and 1.1002.
        for row in &rows[8..] {
            let v = row.bid.expect("full window");
            assert!((v - 1e-4).abs() < 1e-10, "row {}: {v}", row.row);
        }
    }

    #[test]
    fn test_parallel_result_matches_sequential() {
        let all: Vec<_> = (0..16).map(|e| series(e, 0..40)).collect();
        let partitions: Vec<&[Observation]> = all.iter().map(Vec::as_slice).collect();

        let calc = calculator(5);
        let parallel = calc.compute(&partitions);
        let sequential: Vec<StdevRow> = partitions
            .iter()
            .flat_map(|p| calc.compute_entity(p).0)
            .collect();

        assert_eq!(parallel.rows, sequential);
    }
}
