use std::collections::{HashMap, hash_map::Entry};

use crate::data::key::EntityKey;

/// Conversion rule of a single currency pair after fallback resolution.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConversionRule {
    pub requires_conversion: bool,
    /// Raw factor as found in the rules table, kept for the output even when
    /// no conversion is required.
    pub conversion_factor: Option<f64>,
}

impl ConversionRule {
    /// Resolves a raw rules-table row.
    ///
    /// A null / `NaN` / unrecognised `convert_price` means no conversion: pairs
    /// without a flag are not supported for conversion. A flagged pair without a
    /// usable factor cannot be converted either and falls back the same way.
    pub fn resolve(convert_price: Option<bool>, conversion_factor: Option<f64>) -> Self {
        let has_factor = conversion_factor.is_some_and(|f| !f.is_nan());
        Self {
            requires_conversion: convert_price.unwrap_or(false) && has_factor,
            conversion_factor,
        }
    }
}

/// Static mapping from currency pair to its conversion rule.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: HashMap<EntityKey, ConversionRule>,
    duplicates: usize,
}

impl RuleBook {
    /// Builds the book from `(ccy_pair, convert_price, conversion_factor)` rows.
    ///
    /// Rows without a pair are skipped. When a pair appears more than once the
    /// first row wins and the rest are counted in [`duplicates`](Self::duplicates).
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Option<EntityKey>, Option<bool>, Option<f64>)>,
    {
        let mut book = Self::default();
        for (key, flag, factor) in rows {
            let Some(key) = key else { continue };
            match book.rules.entry(key) {
                Entry::Occupied(_) => book.duplicates += 1,
                Entry::Vacant(slot) => {
                    slot.insert(ConversionRule::resolve(flag, factor));
                }
            }
        }
        book
    }

    /// The rule for `key`, or "no conversion" when the pair has no rule.
    pub fn lookup(&self, key: Option<&EntityKey>) -> ConversionRule {
        key.and_then(|k| self.rules.get(k))
            .copied()
            .unwrap_or_default()
    }

    /// Number of distinct pairs with a rule.
    pub fn pair_count(&self) -> usize {
        self.rules.len()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_flag_means_no_conversion() {
        let rule = ConversionRule::resolve(None, None);
        assert!(!rule.requires_conversion);
        assert_eq!(rule.conversion_factor, None);
    }

    #[test]
    fn test_flag_without_factor_falls_back() {
        assert!(!ConversionRule::resolve(Some(true), None).requires_conversion);
        assert!(!ConversionRule::resolve(Some(true), Some(f64::NAN)).requires_conversion);
        assert!(ConversionRule::resolve(Some(true), Some(2.0)).requires_conversion);
    }

    #[test]
    fn test_factor_kept_when_not_converting() {
        let rule = ConversionRule::resolve(Some(false), Some(100.0));
        assert!(!rule.requires_conversion);
        assert_eq!(rule.conversion_factor, Some(100.0));
    }

    #[test]
    fn test_rule_book_first_row_wins() {
        let book = RuleBook::from_rows(vec![
            (Some(EntityKey::from("EURUSD")), Some(true), Some(2.0)),
            (Some(EntityKey::from("EURUSD")), Some(false), Some(3.0)),
            (None, Some(true), Some(4.0)),
            (Some(EntityKey::from("USDJPY")), None, None),
        ]);

        assert_eq!(book.pair_count(), 2);
        assert_eq!(book.duplicates(), 1);

        let eur = book.lookup(Some(&EntityKey::from("EURUSD")));
        assert!(eur.requires_conversion);
        assert_eq!(eur.conversion_factor, Some(2.0));

        let unknown = book.lookup(Some(&EntityKey::from("AUDNZD")));
        assert_eq!(unknown, ConversionRule::default());
        assert_eq!(book.lookup(None), ConversionRule::default());
    }
}
