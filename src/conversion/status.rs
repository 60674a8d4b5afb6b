use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Outcome of converting one price record.
///
/// Failing to find a spot rate is a modelled business outcome, not an error.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// The pair has no (usable) conversion rule; the price is kept as is.
    NoConversionRequired,
    /// A spot rate was found within tolerance and applied.
    ConversionDone,
    /// Conversion was required but no spot rate was found within tolerance.
    ConversionFailedNoSpotRate,
}

impl ConversionStatus {
    /// Classifies a record from its rule and its matched spot rate.
    ///
    /// A `NaN` spot rate counts as missing.
    pub fn classify(requires_conversion: bool, spot_rate: Option<f64>) -> Self {
        match (requires_conversion, spot_rate.filter(|r| !r.is_nan())) {
            (false, _) => Self::NoConversionRequired,
            (true, Some(_)) => Self::ConversionDone,
            (true, None) => Self::ConversionFailedNoSpotRate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_classification_table() {
        use ConversionStatus::*;

        assert_eq!(ConversionStatus::classify(false, None), NoConversionRequired);
        assert_eq!(ConversionStatus::classify(false, Some(1.1)), NoConversionRequired);
        assert_eq!(ConversionStatus::classify(true, Some(1.1)), ConversionDone);
        assert_eq!(ConversionStatus::classify(true, None), ConversionFailedNoSpotRate);
        assert_eq!(
            ConversionStatus::classify(true, Some(f64::NAN)),
            ConversionFailedNoSpotRate
        );
    }

    #[test]
    fn test_output_labels() {
        let labels: Vec<_> = ConversionStatus::iter().map(|s| s.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "no_conversion_required",
                "conversion_done",
                "conversion_failed_no_spot_rate"
            ]
        );
        assert_eq!(
            "conversion_done".parse::<ConversionStatus>().unwrap(),
            ConversionStatus::ConversionDone
        );
    }
}
