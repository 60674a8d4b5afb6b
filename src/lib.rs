//! Batch FX pipelines over polars tables.
//!
//! - [`conversion`]: converts prices with the latest spot rate of their
//!   currency pair inside a backward tolerance window.
//! - [`stdev`]: rolling standard deviations of bid, mid and ask per entity over
//!   contiguous, evenly spaced blocks.
//!
//! Both pipelines read their inputs through [`io`], are configured through
//! [`config`] and report failures as [`error::FxPipeError`].

pub mod config;
pub mod conversion;
pub mod data;
pub mod error;
pub mod io;
pub mod logging;
pub mod prelude;
pub mod stdev;
