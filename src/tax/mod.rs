pub mod bands;
pub mod chargeable;
pub mod compute;
pub mod year;

pub use bands::{Allocation, Band, BandName, BandSet};
pub use chargeable::{ChargeableEvent, ChargeablePool};
pub use compute::{CategoryTax, TaxComputation};
pub use year::{TaxYear, TaxYearParams};

use serde::{Deserialize, Serialize};

/// Categories of taxable money the replay pass accumulates and the tax
/// engine consumes, in the statutory order they are taxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxCategory {
    Salary,
    Rental,
    Interest,
    Dividends,
    CapitalGains,
    /// Chargeable event gains (life assurance bonds), top-sliced
    ChargeableGains,
}

impl TaxCategory {
    pub const ALL: [TaxCategory; 6] = [
        TaxCategory::Salary,
        TaxCategory::Rental,
        TaxCategory::Interest,
        TaxCategory::Dividends,
        TaxCategory::CapitalGains,
        TaxCategory::ChargeableGains,
    ];

    pub fn display(&self) -> &'static str {
        match self {
            TaxCategory::Salary => "Salary",
            TaxCategory::Rental => "Rental",
            TaxCategory::Interest => "Interest",
            TaxCategory::Dividends => "Dividends",
            TaxCategory::CapitalGains => "Capital gains",
            TaxCategory::ChargeableGains => "Chargeable gains",
        }
    }
}

impl std::fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
