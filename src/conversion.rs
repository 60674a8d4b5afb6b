//! Pipeline A: converts prices into a common unit using the most recent spot rate.
//!
//! `rule` merges the static conversion rules, `joiner` finds the backward as-of
//! spot match, `status` classifies the outcome and `transformer` derives the
//! new price. `pipeline` wires them together over loaded tables.

pub mod joiner;
pub mod pipeline;
pub mod record;
pub mod rule;
pub mod status;
pub mod transformer;

pub use pipeline::{ConversionSummary, ConvertedPrices, PriceConverter, run};
pub use status::ConversionStatus;
