use chrono::NaiveDateTime;

use crate::data::key::EntityKey;

/// One price event after the conversion rule of its pair has been merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub ccy_pair: Option<EntityKey>,
    /// Null prices are carried as `NaN`.
    pub price: f64,
    pub requires_conversion: bool,
    pub conversion_factor: Option<f64>,
}

/// One reference (spot) rate observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotRecord {
    pub timestamp: NaiveDateTime,
    pub ccy_pair: EntityKey,
    pub rate: Option<f64>,
}

impl SpotRecord {
    pub fn new(timestamp: NaiveDateTime, ccy_pair: impl Into<EntityKey>, rate: f64) -> Self {
        Self {
            timestamp,
            ccy_pair: ccy_pair.into(),
            rate: Some(rate),
        }
    }

    /// The usable rate: present and not `NaN`.
    pub fn usable_rate(&self) -> Option<f64> {
        self.rate.filter(|r| !r.is_nan())
    }
}
