use crate::tax::year::TaxYearParams;
use rust_decimal::Decimal;

/// The progressive bands, in the fixed order they are consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandName {
    Allowance,
    Low,
    Basic,
    Higher,
    Additional,
}

impl BandName {
    pub fn display(&self) -> &'static str {
        match self {
            BandName::Allowance => "Allowance",
            BandName::Low => "Low",
            BandName::Basic => "Basic",
            BandName::Higher => "Higher",
            BandName::Additional => "Additional",
        }
    }
}

impl std::fmt::Display for BandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// One band with its remaining capacity. `None` capacity is unbounded
/// (the topmost band).
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub name: BandName,
    pub remaining: Option<Decimal>,
}

/// One slice of an allocation: how much of an amount fell into a band and
/// the tax it bore there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub band: BandName,
    pub amount: Decimal,
    pub rate: Decimal,
    pub tax: Decimal,
}

/// The band set shared by every tax category in one computation. Amounts
/// are allocated bottom-up; each category supplies its own rate per band,
/// and a `None` rate skips the band without consuming it. Band balances
/// only ever decrease within one computation.
#[derive(Debug, Clone)]
pub struct BandSet {
    bands: Vec<Band>,
}

impl BandSet {
    /// Build the band set from the year's parameters and the personal
    /// allowance already adjusted for age and tapering.
    pub fn new(allowance: Decimal, params: &TaxYearParams) -> Self {
        let mut bands = vec![Band {
            name: BandName::Allowance,
            remaining: Some(allowance),
        }];
        if let Some(low) = &params.low_band {
            bands.push(Band {
                name: BandName::Low,
                remaining: Some(low.width),
            });
        }
        bands.push(Band {
            name: BandName::Basic,
            remaining: Some(params.basic_band.width),
        });
        match (params.higher_band_width, params.additional_rate) {
            (Some(width), Some(_)) => {
                bands.push(Band {
                    name: BandName::Higher,
                    remaining: Some(width),
                });
                bands.push(Band {
                    name: BandName::Additional,
                    remaining: None,
                });
            }
            _ => bands.push(Band {
                name: BandName::Higher,
                remaining: None,
            }),
        }
        BandSet { bands }
    }

    /// Allocate an amount across the bands bottom-up. `rate_for` gives the
    /// category's rate in each band; `None` skips the band leaving its
    /// balance untouched.
    pub fn allocate<F>(&mut self, amount: Decimal, rate_for: F) -> Vec<Allocation>
    where
        F: Fn(BandName) -> Option<Decimal>,
    {
        let mut left = amount;
        let mut allocations = Vec::new();
        for band in &mut self.bands {
            if left <= Decimal::ZERO {
                break;
            }
            let Some(rate) = rate_for(band.name) else {
                continue;
            };
            let take = match band.remaining {
                Some(remaining) => left.min(remaining),
                None => left,
            };
            if take.is_zero() {
                continue;
            }
            if let Some(remaining) = &mut band.remaining {
                *remaining -= take;
            }
            left -= take;
            let tax = take * rate;
            log::debug!(
                "Allocated {} to {} band at {}: tax {}",
                take,
                band.name,
                rate,
                tax
            );
            allocations.push(Allocation {
                band: band.name,
                amount: take,
                rate,
                tax,
            });
        }
        allocations
    }

    /// Remaining capacity of a band; zero once exhausted, `None` when the
    /// band is unbounded or absent this year.
    pub fn remaining(&self, name: BandName) -> Option<Decimal> {
        self.bands
            .iter()
            .find(|band| band.name == name)
            .and_then(|band| band.remaining)
    }

}

/// Total tax across a set of allocations
pub fn total_tax(allocations: &[Allocation]) -> Decimal {
    allocations.iter().map(|a| a.tax).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::year::TaxYear;
    use rust_decimal_macros::dec;

    fn bands_2025(allowance: Decimal) -> BandSet {
        BandSet::new(allowance, &TaxYearParams::for_year(TaxYear(2025)))
    }

    fn income_rate(band: BandName) -> Option<Decimal> {
        Some(match band {
            BandName::Allowance => Decimal::ZERO,
            BandName::Low => dec!(0.10),
            BandName::Basic => dec!(0.20),
            BandName::Higher => dec!(0.40),
            BandName::Additional => dec!(0.45),
        })
    }

    #[test]
    fn allocates_bottom_up() {
        let mut bands = bands_2025(dec!(12570));
        let allocations = bands.allocate(dec!(60000), income_rate);

        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].band, BandName::Allowance);
        assert_eq!(allocations[0].amount, dec!(12570));
        assert_eq!(allocations[0].tax, Decimal::ZERO);
        assert_eq!(allocations[1].band, BandName::Basic);
        assert_eq!(allocations[1].amount, dec!(37700));
        assert_eq!(allocations[1].tax, dec!(7540.00));
        assert_eq!(allocations[2].band, BandName::Higher);
        assert_eq!(allocations[2].amount, dec!(9730));
        assert_eq!(total_tax(&allocations), dec!(7540.00) + dec!(3892.00));
    }

    #[test]
    fn balances_decrease_across_calls() {
        let mut bands = bands_2025(dec!(12570));
        bands.allocate(dec!(20000), income_rate);
        assert_eq!(bands.remaining(BandName::Allowance), Some(Decimal::ZERO));
        assert_eq!(bands.remaining(BandName::Basic), Some(dec!(30270)));

        bands.allocate(dec!(30270), income_rate);
        assert_eq!(bands.remaining(BandName::Basic), Some(Decimal::ZERO));
    }

    #[test]
    fn none_rate_skips_without_consuming() {
        let mut bands = bands_2025(dec!(12570));
        // Dividend-style: never uses the allowance band here
        let allocations = bands.allocate(dec!(1000), |band| match band {
            BandName::Allowance => None,
            _ => Some(dec!(0.0875)),
        });
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].band, BandName::Basic);
        assert_eq!(bands.remaining(BandName::Allowance), Some(dec!(12570)));
        assert_eq!(bands.remaining(BandName::Basic), Some(dec!(36700)));
    }

    #[test]
    fn unbounded_top_band_takes_the_rest() {
        let mut bands = bands_2025(dec!(12570));
        let allocations = bands.allocate(dec!(1000000), income_rate);
        let top = allocations.last().unwrap();
        assert_eq!(top.band, BandName::Additional);
        assert_eq!(top.amount, dec!(1000000) - dec!(12570) - dec!(37700) - dec!(87440));
    }

    #[test]
    fn low_band_present_in_historic_years() {
        let params = TaxYearParams::for_year(TaxYear(2008));
        let mut bands = BandSet::new(params.personal_allowance, &params);
        assert_eq!(bands.remaining(BandName::Low), Some(dec!(2230)));
        // No additional band that year: the higher band is unbounded
        let allocations = bands.allocate(dec!(500000), income_rate);
        assert_eq!(allocations.last().unwrap().band, BandName::Higher);
    }
}
