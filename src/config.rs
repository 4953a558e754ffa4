use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Thresholds for the "large distribution" test applied to rights-waived
/// and cash-takeover events. A distribution is large only when it exceeds
/// BOTH the absolute amount and the given fraction of the holding's value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_waiver_absolute")]
    pub waiver_absolute: Decimal,
    #[serde(default = "default_waiver_relative")]
    pub waiver_relative: Decimal,
}

fn default_waiver_absolute() -> Decimal {
    dec!(3000)
}

fn default_waiver_relative() -> Decimal {
    dec!(0.05)
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            waiver_absolute: default_waiver_absolute(),
            waiver_relative: default_waiver_relative(),
        }
    }
}

impl Thresholds {
    pub fn is_large(&self, amount: Decimal, holding_value: Decimal) -> bool {
        amount > self.waiver_absolute && amount > holding_value * self.waiver_relative
    }

    pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_requires_both_thresholds() {
        let t = Thresholds::default();

        // Above absolute but tiny next to the holding
        assert!(!t.is_large(dec!(4000), dec!(1_000_000)));
        // Above relative but below absolute
        assert!(!t.is_large(dec!(500), dec!(1000)));
        // Above both
        assert!(t.is_large(dec!(4000), dec!(10000)));
    }

    #[test]
    fn read_json_with_defaults() {
        let t = Thresholds::read_json(r#"{"waiver_absolute": "1000"}"#.as_bytes()).unwrap();
        assert_eq!(t.waiver_absolute, dec!(1000));
        assert_eq!(t.waiver_relative, dec!(0.05));
    }
}
