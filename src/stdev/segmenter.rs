use chrono::{NaiveDateTime, TimeDelta};

/// Assigns a contiguous-block id to each timestamp of one entity.
///
/// `timestamps` must already be sorted. A block starts at the first
/// observation and at every position whose distance to its predecessor is not
/// exactly `step`: wider gaps, duplicates and backwards jumps all break the run.
/// Ids count block starts from 1.
pub fn block_ids(timestamps: &[NaiveDateTime], step: TimeDelta) -> Vec<u32> {
    let mut current = 0;
    let mut prev: Option<NaiveDateTime> = None;

    timestamps
        .iter()
        .map(|&ts| {
            if prev.is_none_or(|p| ts - p != step) {
                current += 1;
            }
            prev = Some(ts);
            current
        })
        .collect()
}

/// Number of blocks in an id sequence produced by [`block_ids`].
pub fn block_count(ids: &[u32]) -> usize {
    ids.last().map_or(0, |&id| id as usize)
}
