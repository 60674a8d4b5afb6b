//! Pipeline B: rolling standard deviations of bid, mid and ask per entity.
//!
//! Observations are sorted per entity, split into contiguous blocks of
//! evenly spaced timestamps, and a trailing window runs inside each block.

pub mod calculator;
pub mod observation;
pub mod pipeline;
pub mod rolling;
pub mod segmenter;

pub use pipeline::{RollingStdevs, StdevPipeline, StdevSummary, run};
