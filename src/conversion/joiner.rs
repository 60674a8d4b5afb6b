use std::collections::HashMap;

use chrono::{NaiveDateTime, TimeDelta};

use crate::{
    conversion::record::{PriceRecord, SpotRecord},
    data::key::EntityKey,
};

/// A spot record selected for a price record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotMatch {
    /// Position of the matched record in the caller's spot slice.
    pub index: usize,
    /// Another spot record of the same pair shares the matched timestamp.
    /// The last one in input order was chosen.
    pub ambiguous: bool,
}

/// Spot records partitioned by pair, each partition ordered by timestamp.
///
/// Ordering is a stable sort on `(timestamp, ccy_pair)`, so records sharing a
/// timestamp keep their input order inside a partition.
#[derive(Debug)]
pub struct SpotIndex<'a> {
    spots: &'a [SpotRecord],
    partitions: HashMap<&'a EntityKey, Vec<usize>>,
}

impl<'a> SpotIndex<'a> {
    pub fn new(spots: &'a [SpotRecord]) -> Self {
        let mut order: Vec<usize> = (0..spots.len()).collect();
        order.sort_by(|&a, &b| {
            (spots[a].timestamp, &spots[a].ccy_pair).cmp(&(spots[b].timestamp, &spots[b].ccy_pair))
        });

        let mut partitions: HashMap<&EntityKey, Vec<usize>> = HashMap::new();
        for i in order {
            partitions.entry(&spots[i].ccy_pair).or_default().push(i);
        }

        Self { spots, partitions }
    }

    /// Latest spot record of `key` with `ts - tolerance <= spot.ts <= ts`.
    pub fn find(&self, key: &EntityKey, ts: NaiveDateTime, tolerance: TimeDelta) -> Option<SpotMatch> {
        let partition = self.partitions.get(key)?;
        let pos = partition.partition_point(|&i| self.spots[i].timestamp <= ts);
        let candidate = *partition.get(pos.checked_sub(1)?)?;

        let matched_ts = self.spots[candidate].timestamp;
        if ts - matched_ts > tolerance {
            return None;
        }

        let ambiguous = pos >= 2 && self.spots[partition[pos - 2]].timestamp == matched_ts;
        Some(SpotMatch {
            index: candidate,
            ambiguous,
        })
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

/// Result of matching price records against spot records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOutcome {
    /// One entry per price record, in the price records' original order.
    pub matches: Vec<Option<SpotMatch>>,
    /// Number of price records that took part in the match.
    pub candidates: usize,
    pub ambiguous: usize,
}

impl JoinOutcome {
    /// Matched rate per price record, aligned with the price records. `NaN` rates count as absent.
    pub fn spot_rates(&self, spots: &[SpotRecord]) -> Vec<Option<f64>> {
        self.matches
            .iter()
            .map(|m| m.and_then(|m| spots[m.index].usable_rate()))
            .collect()
    }
}

/// Backward as-of join of `prices` against `spots` within `tolerance`.
///
/// Only records with `requires_conversion` take part. Records without a pair
/// or timestamp, and all non-participating records, get no match.
pub fn join_backward(
    prices: &[PriceRecord],
    spots: &[SpotRecord],
    tolerance: TimeDelta,
) -> JoinOutcome {
    let index = SpotIndex::new(spots);
    let mut outcome = JoinOutcome {
        matches: vec![None; prices.len()],
        ..JoinOutcome::default()
    };

    for (slot, record) in outcome.matches.iter_mut().zip(prices) {
        if !record.requires_conversion {
            continue;
        }
        outcome.candidates += 1;

        let (Some(key), Some(ts)) = (record.ccy_pair.as_ref(), record.timestamp) else {
            continue;
        };
        *slot = index.find(key, ts, tolerance);
    }

    outcome.ambiguous = outcome.matches.iter().flatten().filter(|m| m.ambiguous).count();

    tracing::debug!(
        pairs = index.partition_count(),
        candidates = outcome.candidates,
        matched = outcome.matches.iter().flatten().count(),
        "As-of join finished"
    );
    outcome
}
