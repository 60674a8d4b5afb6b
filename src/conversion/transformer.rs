use itertools::izip;

use crate::conversion::status::ConversionStatus;

/// Derives the converted price of every record in one pass.
///
/// - `NoConversionRequired`: the price itself.
/// - `ConversionDone`: `price / conversion_factor + spot_rate`.
/// - `ConversionFailedNoSpotRate`: absent.
///
/// Division by a zero factor yields an infinite or `NaN` price, which is
/// passed through untouched. All slices must have the same length.
pub fn new_prices(
    prices: &[f64],
    factors: &[Option<f64>],
    spot_rates: &[Option<f64>],
    statuses: &[ConversionStatus],
) -> Vec<Option<f64>> {
    debug_assert!(
        prices.len() == factors.len()
            && prices.len() == spot_rates.len()
            && prices.len() == statuses.len()
    );

    izip!(prices, factors, spot_rates, statuses)
        .map(|(&price, &factor, &spot, &status)| match (status, factor, spot) {
            (ConversionStatus::NoConversionRequired, _, _) => Some(price),
            (ConversionStatus::ConversionDone, Some(factor), Some(spot)) => {
                Some(price / factor + spot)
            }
            // `ConversionDone` always carries both operands; anything else has no price.
            (ConversionStatus::ConversionDone, _, _)
            | (ConversionStatus::ConversionFailedNoSpotRate, _, _) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worked_example() {
        let out = new_prices(
            &[100.0],
            &[Some(2.0)],
            &[Some(1.1)],
            &[ConversionStatus::ConversionDone],
        );
        let value = out[0].expect("converted price");
        assert!((value - 51.1).abs() < 1e-12, "got {value}");
    }

    #[test]
    fn test_identity_and_absent() {
        let out = new_prices(
            &[42.0, 7.0],
            &[None, Some(2.0)],
            &[None, None],
            &[
                ConversionStatus::NoConversionRequired,
                ConversionStatus::ConversionFailedNoSpotRate,
            ],
        );
        assert_eq!(out, vec![Some(42.0), None]);
    }

    #[test]
    fn test_numeric_edge_cases_propagate() {
        let out = new_prices(
            &[1.0, f64::NAN],
            &[Some(0.0), Some(2.0)],
            &[Some(1.0), Some(1.0)],
            &[ConversionStatus::ConversionDone, ConversionStatus::ConversionDone],
        );
        assert_eq!(out[0], Some(f64::INFINITY));
        assert!(out[1].expect("present").is_nan());
    }
}
