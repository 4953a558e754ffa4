use crate::tax::bands::{total_tax, Allocation, BandName, BandSet};
use crate::tax::chargeable::ChargeablePool;
use crate::tax::year::{TaxYear, TaxYearParams};
use crate::tax::TaxCategory;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Personal allowance after age uplift and income tapering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allowances {
    pub personal: Decimal,
    /// Age tier applied: 65 or 75 where the year had age allowances
    pub applicable_age: Option<i32>,
    /// Any taper reduced the allowance below its untapered value
    pub allowance_reduced: bool,
    /// The age-allowance taper specifically cut the allowance; rules out
    /// top-slicing relief
    pub age_taper_applied: bool,
}

/// Work out the personal allowance for the year. The age tier is picked by
/// age at the tax-year end; the age allowance tapers away at 1 for every 2
/// of income above the limit, never below the standard allowance; above the
/// upper income limit the standard allowance itself tapers to zero.
pub fn calculate_allowances(
    params: &TaxYearParams,
    gross_income: Decimal,
    age: Option<i32>,
) -> Allowances {
    let mut applicable_age = None;
    let mut allowance = params.personal_allowance;
    if let Some(age) = age {
        if age >= 75 {
            if let Some(tier) = params.age_allowance_75 {
                allowance = tier;
                applicable_age = Some(75);
            }
        } else if age >= 65 {
            if let Some(tier) = params.age_allowance_65 {
                allowance = tier;
                applicable_age = Some(65);
            }
        }
    }
    let untapered = allowance;

    let mut age_taper_applied = false;
    if applicable_age.is_some() {
        if let Some(limit) = params.age_allowance_limit {
            if gross_income > limit {
                let reduction = (gross_income - limit) / Decimal::TWO;
                let tapered = (allowance - reduction).max(params.personal_allowance);
                age_taper_applied = tapered < allowance;
                allowance = tapered;
            }
        }
    }
    if let Some(limit) = params.allowance_taper_limit {
        if gross_income > limit {
            let reduction = (gross_income - limit) / Decimal::TWO;
            allowance = (allowance - reduction).max(Decimal::ZERO);
        }
    }

    Allowances {
        personal: allowance,
        applicable_age,
        allowance_reduced: allowance < untapered,
        age_taper_applied,
    }
}

/// Tax due on one category of money
#[derive(Debug, Clone)]
pub struct CategoryTax {
    pub category: TaxCategory,
    pub gross: Decimal,
    /// Amount carried into the bands after category allowances
    pub taxable: Decimal,
    pub tax: Decimal,
    pub allocations: Vec<Allocation>,
}

/// The full tax computation for one year: categories taxed in statutory
/// order against one shared band set.
#[derive(Debug, Clone)]
pub struct TaxComputation {
    pub year: TaxYear,
    pub allowances: Allowances,
    pub categories: Vec<CategoryTax>,
    pub chargeable: ChargeablePool,
    pub total_tax: Decimal,
    /// Tax already paid or credited at source during the period
    pub tax_paid: Decimal,
    /// Chargeable gains were taxed via top-slicing rather than directly
    pub gains_sliced: bool,
    bands: BandSet,
}

fn income_rates(params: &TaxYearParams) -> impl Fn(BandName) -> Option<Decimal> + '_ {
    move |band| match band {
        BandName::Allowance => Some(Decimal::ZERO),
        BandName::Low => params.low_band.map(|b| b.rate),
        BandName::Basic => Some(params.basic_band.rate),
        BandName::Higher => Some(params.higher_rate),
        BandName::Additional => params.additional_rate,
    }
}

fn dividend_rates(params: &TaxYearParams) -> impl Fn(BandName) -> Option<Decimal> + '_ {
    move |band| match band {
        BandName::Allowance => Some(Decimal::ZERO),
        // The low band never applied to dividends; skip without consuming
        BandName::Low => None,
        BandName::Basic => Some(params.dividend_basic_rate),
        BandName::Higher => Some(params.dividend_higher_rate),
        BandName::Additional => Some(
            params
                .dividend_additional_rate
                .unwrap_or(params.dividend_higher_rate),
        ),
    }
}

/// Capital gains sit on top of income: the personal allowance and low band
/// are never available to them.
fn cgt_rates(params: &TaxYearParams) -> impl Fn(BandName) -> Option<Decimal> + '_ {
    move |band| match band {
        BandName::Allowance | BandName::Low => None,
        BandName::Basic => Some(params.cgt_basic_rate),
        BandName::Higher | BandName::Additional => Some(params.cgt_higher_rate),
    }
}

fn gains_as_income_rates(params: &TaxYearParams) -> impl Fn(BandName) -> Option<Decimal> + '_ {
    move |band| match band {
        BandName::Allowance | BandName::Low => None,
        BandName::Basic => Some(params.basic_band.rate),
        BandName::Higher => Some(params.higher_rate),
        BandName::Additional => params.additional_rate.or(Some(params.higher_rate)),
    }
}

impl TaxComputation {
    /// Run the whole computation: allowances, then each category in fixed
    /// order against the shared bands, chargeable gains last.
    pub fn compute(
        params: &TaxYearParams,
        year: TaxYear,
        totals: &BTreeMap<TaxCategory, Decimal>,
        chargeable: ChargeablePool,
        tax_paid: Decimal,
        age: Option<i32>,
    ) -> Self {
        let category_total =
            |category: TaxCategory| totals.get(&category).copied().unwrap_or(Decimal::ZERO);

        let gross_income = category_total(TaxCategory::Salary)
            + category_total(TaxCategory::Rental)
            + category_total(TaxCategory::Interest)
            + category_total(TaxCategory::Dividends)
            + chargeable.total_gain();
        let allowances = calculate_allowances(params, gross_income, age);
        log::debug!(
            "Tax {}: gross income {}, allowance {}",
            year,
            gross_income,
            allowances.personal
        );

        let mut computation = TaxComputation {
            year,
            allowances,
            categories: Vec::new(),
            chargeable,
            total_tax: Decimal::ZERO,
            tax_paid,
            gains_sliced: false,
            bands: BandSet::new(allowances.personal, params),
        };

        let salary = category_total(TaxCategory::Salary);
        computation.tax_category(TaxCategory::Salary, salary, salary, income_rates(params));

        let rental = category_total(TaxCategory::Rental);
        let rental_taxable = (rental - params.rental_allowance).max(Decimal::ZERO);
        computation.tax_category(TaxCategory::Rental, rental, rental_taxable, income_rates(params));

        let interest = category_total(TaxCategory::Interest);
        computation.tax_category(TaxCategory::Interest, interest, interest, income_rates(params));

        let dividends = category_total(TaxCategory::Dividends);
        computation.tax_category(
            TaxCategory::Dividends,
            dividends,
            dividends,
            dividend_rates(params),
        );

        let gains = category_total(TaxCategory::CapitalGains);
        let gains_taxable = (gains - params.cgt_allowance).max(Decimal::ZERO);
        if params.gains_as_income {
            computation.tax_category(
                TaxCategory::CapitalGains,
                gains,
                gains_taxable,
                gains_as_income_rates(params),
            );
        } else {
            computation.tax_category(
                TaxCategory::CapitalGains,
                gains,
                gains_taxable,
                cgt_rates(params),
            );
        }

        computation.tax_chargeable_gains(params);

        computation.total_tax = computation.categories.iter().map(|c| c.tax).sum();
        computation
    }

    fn tax_category<F>(&mut self, category: TaxCategory, gross: Decimal, taxable: Decimal, rates: F)
    where
        F: Fn(BandName) -> Option<Decimal>,
    {
        let allocations = self.bands.allocate(taxable, rates);
        let tax = total_tax(&allocations).round_dp(2);
        log::debug!("{}: taxable {} -> tax {}", category, taxable, tax);
        self.categories.push(CategoryTax {
            category,
            gross,
            taxable,
            tax,
            allocations,
        });
    }

    /// Chargeable event gains with top-slicing relief. The whole gain is
    /// taxed directly when it fits below the higher band, when the basic
    /// band is already exhausted, or when the age-allowance taper is in
    /// effect (relief and age allowance are mutually exclusive). Otherwise
    /// the tax on one slice is scaled back up to the full gain, and the
    /// slice tax is what gets shared back across the pool.
    fn tax_chargeable_gains(&mut self, params: &TaxYearParams) {
        if self.chargeable.is_empty() {
            return;
        }
        let gain = self.chargeable.total_gain();

        let headroom = self.bands.remaining(BandName::Allowance).unwrap_or(Decimal::ZERO)
            + self.bands.remaining(BandName::Low).unwrap_or(Decimal::ZERO)
            + self.bands.remaining(BandName::Basic).unwrap_or(Decimal::ZERO);
        let basic_exhausted = self.bands.remaining(BandName::Basic) == Some(Decimal::ZERO);

        if gain <= headroom || basic_exhausted || self.allowances.age_taper_applied {
            let allocations = self.bands.allocate(gain, income_rates(params));
            let tax = total_tax(&allocations).round_dp(2);
            self.categories.push(CategoryTax {
                category: TaxCategory::ChargeableGains,
                gross: gain,
                taxable: gain,
                tax,
                allocations,
            });
            self.chargeable.apportion(tax);
        } else {
            let slice = self.chargeable.total_slice();
            let mut trial = self.bands.clone();
            let slice_tax = total_tax(&trial.allocate(slice, income_rates(params))).round_dp(2);
            let slice_at_basic = slice * params.basic_band.rate;
            let higher_excess = (slice_tax - slice_at_basic).max(Decimal::ZERO);
            let tax = (gain * params.basic_band.rate + higher_excess * gain / slice).round_dp(2);
            log::debug!(
                "Top-slicing: gain {} slice {} slice tax {} -> total {}",
                gain,
                slice,
                slice_tax,
                tax
            );
            // The full gain still fills the bands for anything taxed later
            let allocations = self.bands.allocate(gain, income_rates(params));
            self.gains_sliced = true;
            self.categories.push(CategoryTax {
                category: TaxCategory::ChargeableGains,
                gross: gain,
                taxable: gain,
                tax,
                allocations,
            });
            self.chargeable.apportion(slice_tax);
        }
    }

    /// Tax still owed after credits taken during replay
    pub fn tax_owed(&self) -> Decimal {
        self.total_tax - self.tax_paid
    }

    pub fn category(&self, category: TaxCategory) -> Option<&CategoryTax> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn bands(&self) -> &BandSet {
        &self.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn totals(entries: &[(TaxCategory, Decimal)]) -> BTreeMap<TaxCategory, Decimal> {
        entries.iter().copied().collect()
    }

    fn compute(
        params: &TaxYearParams,
        entries: &[(TaxCategory, Decimal)],
        chargeable: ChargeablePool,
        age: Option<i32>,
    ) -> TaxComputation {
        TaxComputation::compute(
            params,
            TaxYear(params.year),
            &totals(entries),
            chargeable,
            Decimal::ZERO,
            age,
        )
    }

    #[test]
    fn salary_only() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let c = compute(&params, &[(TaxCategory::Salary, dec!(50000))], ChargeablePool::default(), None);
        // 12570 at nil, 37430 at 20%
        assert_eq!(c.total_tax, dec!(7486.00));
        assert!(!c.allowances.allowance_reduced);
    }

    #[test]
    fn age_allowance_taper_endpoints() {
        let params = TaxYearParams::for_year(TaxYear(2011));

        // At the limit: full age allowance
        let at = calculate_allowances(&params, dec!(22900), Some(70));
        assert_eq!(at.personal, dec!(9490));
        assert_eq!(at.applicable_age, Some(65));
        assert!(!at.allowance_reduced);

        // 1000 over: reduced by 500
        let over = calculate_allowances(&params, dec!(23900), Some(70));
        assert_eq!(over.personal, dec!(8990));
        assert!(over.allowance_reduced);
        assert!(over.age_taper_applied);

        // Far over: floored at the standard allowance
        let far = calculate_allowances(&params, dec!(90000), Some(70));
        assert_eq!(far.personal, dec!(6475));

        // 75+ tier
        let older = calculate_allowances(&params, dec!(20000), Some(80));
        assert_eq!(older.personal, dec!(9640));
        assert_eq!(older.applicable_age, Some(75));
    }

    #[test]
    fn standard_allowance_tapers_to_zero() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let a = calculate_allowances(&params, dec!(125140), None);
        assert_eq!(a.personal, Decimal::ZERO);
        assert!(a.allowance_reduced);
        assert!(!a.age_taper_applied);

        let at_limit = calculate_allowances(&params, dec!(100000), None);
        assert_eq!(at_limit.personal, dec!(12570));
    }

    #[test]
    fn dividends_after_salary() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let c = compute(
            &params,
            &[
                (TaxCategory::Salary, dec!(30000)),
                (TaxCategory::Dividends, dec!(10000)),
            ],
            ChargeablePool::default(),
            None,
        );
        // Salary: 12570 nil + 17430 at 20% = 3486
        // Dividends: all within remaining basic band at 8.75% = 875
        let dividends = c.category(TaxCategory::Dividends).unwrap();
        assert_eq!(dividends.tax, dec!(875.00));
        assert_eq!(c.total_tax, dec!(3486.00) + dec!(875.00));
    }

    #[test]
    fn capital_gains_two_tier_rates() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let c = compute(
            &params,
            &[
                (TaxCategory::Salary, dec!(48270)),
                (TaxCategory::CapitalGains, dec!(13000)),
            ],
            ChargeablePool::default(),
            None,
        );
        // Salary leaves 2000 of basic band; taxable gains 10000:
        // 2000 at 18% + 8000 at 24%
        let gains = c.category(TaxCategory::CapitalGains).unwrap();
        assert_eq!(gains.taxable, dec!(10000));
        assert_eq!(gains.tax, dec!(360.00) + dec!(1920.00));
    }

    #[test]
    fn net_capital_loss_bears_no_tax() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let c = compute(
            &params,
            &[(TaxCategory::CapitalGains, dec!(-5000))],
            ChargeablePool::default(),
            None,
        );
        assert_eq!(c.category(TaxCategory::CapitalGains).unwrap().tax, Decimal::ZERO);
    }

    #[test]
    fn gains_as_income_share_the_bands() {
        let params = TaxYearParams::for_year(TaxYear(2008));
        let c = compute(
            &params,
            &[
                (TaxCategory::Salary, dec!(37595)),
                (TaxCategory::CapitalGains, dec!(10200)),
            ],
            ChargeablePool::default(),
            None,
        );
        // Salary uses allowance 5225 + low 2230 + 30140 of basic,
        // leaving 2230 of basic. Taxable gains 1000 fall there at the
        // basic income rate, never back into the allowance.
        let gains = c.category(TaxCategory::CapitalGains).unwrap();
        assert_eq!(gains.taxable, dec!(1000));
        assert_eq!(gains.tax, dec!(220.00));
    }

    #[test]
    fn chargeable_gain_within_basic_band_untouched_by_slicing() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let mut pool = ChargeablePool::default();
        pool.push(crate::tax::ChargeableEvent::new(dec!(5000), dec!(1000), 5));
        let c = compute(&params, &[(TaxCategory::Salary, dec!(30000))], pool, None);

        let gains = c.category(TaxCategory::ChargeableGains).unwrap();
        assert_eq!(gains.tax, dec!(1000.00)); // 5000 at 20%
        assert!(!c.gains_sliced);
        assert_eq!(c.chargeable.events()[0].apportioned_tax, dec!(1000.00));
    }

    #[test]
    fn top_slicing_keeps_sliced_gain_at_basic_rate() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let mut pool = ChargeablePool::default();
        // Gain straddles the higher threshold, but each year's slice fits
        pool.push(crate::tax::ChargeableEvent::new(dec!(30000), Decimal::ZERO, 5));
        let c = compute(&params, &[(TaxCategory::Salary, dec!(40000))], pool, None);

        let gains = c.category(TaxCategory::ChargeableGains).unwrap();
        assert!(c.gains_sliced);
        assert_eq!(gains.tax, dec!(6000.00)); // whole gain at 20%
        // The pool carries the slice tax, not the scaled-up category tax
        assert_eq!(c.chargeable.events()[0].apportioned_tax, dec!(1200.00));
    }

    #[test]
    fn top_slicing_scales_higher_rate_excess() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let mut pool = ChargeablePool::default();
        pool.push(crate::tax::ChargeableEvent::new(dec!(30000), Decimal::ZERO, 2));
        let c = compute(&params, &[(TaxCategory::Salary, dec!(40000))], pool, None);

        // Salary leaves 10270 of basic band. Slice 15000: 10270 at 20% +
        // 4730 at 40% = 3946; excess over basic 946, scaled by 2 years and
        // added to 30000 at 20%.
        let gains = c.category(TaxCategory::ChargeableGains).unwrap();
        assert!(c.gains_sliced);
        assert_eq!(gains.tax, dec!(6000.00) + dec!(1892.00));
        // Only the slice tax is shared back onto the event
        assert_eq!(c.chargeable.events()[0].apportioned_tax, dec!(3946.00));
    }

    #[test]
    fn sliced_pool_shares_slice_tax_pro_rata() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let mut pool = ChargeablePool::default();
        pool.push(crate::tax::ChargeableEvent::new(dec!(3000), Decimal::ZERO, 3));
        pool.push(crate::tax::ChargeableEvent::new(dec!(2000), Decimal::ZERO, 2));
        pool.push(crate::tax::ChargeableEvent::new(dec!(1000), Decimal::ZERO, 1));
        // Salary leaves 3270 of basic band: the 6000 gain overflows it but
        // the 3000 combined slice does not
        let c = compute(&params, &[(TaxCategory::Salary, dec!(47000))], pool, None);

        assert!(c.gains_sliced);
        assert_eq!(c.category(TaxCategory::ChargeableGains).unwrap().tax, dec!(1200.00));
        // Equal slices split the 600 slice tax equally
        for event in c.chargeable.events() {
            assert_eq!(event.apportioned_tax, dec!(200.00));
        }
    }

    #[test]
    fn standard_taper_leaves_slicing_available() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let mut pool = ChargeablePool::default();
        pool.push(crate::tax::ChargeableEvent::new(dec!(90000), Decimal::ZERO, 10));
        // Gross 120000 tapers the standard allowance to 2570, but no age
        // allowance is in play so relief still applies
        let c = compute(&params, &[(TaxCategory::Salary, dec!(30000))], pool, None);

        assert!(c.allowances.allowance_reduced);
        assert!(!c.allowances.age_taper_applied);
        assert!(c.gains_sliced);
        // Slice 9000 fits the remaining basic band: whole gain at 20%
        assert_eq!(c.category(TaxCategory::ChargeableGains).unwrap().tax, dec!(18000.00));
        assert_eq!(c.chargeable.events()[0].apportioned_tax, dec!(1800.00));
    }

    #[test]
    fn reduced_allowance_disables_slicing() {
        let params = TaxYearParams::for_year(TaxYear(2011));
        let mut pool = ChargeablePool::default();
        pool.push(crate::tax::ChargeableEvent::new(dec!(20000), Decimal::ZERO, 10));
        // Age allowance tapered by the gain itself
        let c = compute(&params, &[(TaxCategory::Salary, dec!(20000))], pool, Some(70));

        assert!(c.allowances.age_taper_applied);
        assert!(!c.gains_sliced);
    }

    #[test]
    fn tax_owed_nets_off_credits() {
        let params = TaxYearParams::for_year(TaxYear(2025));
        let c = TaxComputation::compute(
            &params,
            TaxYear(2025),
            &totals(&[(TaxCategory::Salary, dec!(50000))]),
            ChargeablePool::default(),
            dec!(7000),
            None,
        );
        assert_eq!(c.tax_owed(), dec!(486.00));
    }
}
