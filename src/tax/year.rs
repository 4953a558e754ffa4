use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Tax year running 6 April to 5 April.
/// The year value represents the end year (e.g., 2025 = 2024/25 tax year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxYear(pub i32);

impl TaxYear {
    /// Create a tax year from a date
    pub fn from_date(date: NaiveDate) -> Self {
        let year = date.year();
        // 6 April or later falls in the tax year ending next April
        if date >= NaiveDate::from_ymd_opt(year, 4, 6).unwrap() {
            TaxYear(year + 1)
        } else {
            TaxYear(year)
        }
    }

    /// Start date of the tax year (6 April of previous year)
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0 - 1, 4, 6).unwrap()
    }

    /// End date of the tax year (5 April)
    pub fn end_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0, 4, 5).unwrap()
    }

    /// Age of a person born on `birth_date` at the end of this tax year
    pub fn age_at_end(&self, birth_date: NaiveDate) -> i32 {
        let end = self.end_date();
        let mut age = end.year() - birth_date.year();
        if (end.month(), end.day()) < (birth_date.month(), birth_date.day()) {
            age -= 1;
        }
        age
    }

    /// Display as "2024/25" format
    pub fn display(&self) -> String {
        format!("{}/{:02}", self.0 - 1, self.0 % 100)
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Width and rate of one progressive band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandParams {
    pub width: Decimal,
    pub rate: Decimal,
}

/// All rates, allowances and band widths for one tax year. Built-in table
/// for recent years; older or overridden years load from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxYearParams {
    /// Tax year end year this parameter set applies to
    pub year: i32,
    pub personal_allowance: Decimal,
    /// Raised allowance from age 65, where the year had one
    #[serde(default)]
    pub age_allowance_65: Option<Decimal>,
    /// Further raised allowance from age 75
    #[serde(default)]
    pub age_allowance_75: Option<Decimal>,
    /// Income limit above which the age allowance tapers away
    #[serde(default)]
    pub age_allowance_limit: Option<Decimal>,
    /// Income limit above which the personal allowance itself tapers to zero
    #[serde(default)]
    pub allowance_taper_limit: Option<Decimal>,
    /// Historic reduced-rate starting band, absent in later years
    #[serde(default)]
    pub low_band: Option<BandParams>,
    pub basic_band: BandParams,
    pub higher_rate: Decimal,
    /// Width of the higher band where an additional band sits above it
    #[serde(default)]
    pub higher_band_width: Option<Decimal>,
    #[serde(default)]
    pub additional_rate: Option<Decimal>,
    pub dividend_basic_rate: Decimal,
    pub dividend_higher_rate: Decimal,
    #[serde(default)]
    pub dividend_additional_rate: Option<Decimal>,
    pub cgt_allowance: Decimal,
    pub cgt_basic_rate: Decimal,
    pub cgt_higher_rate: Decimal,
    /// Capital gains taxed as the top slice of income at income rates,
    /// rather than at the dedicated CGT rates
    #[serde(default)]
    pub gains_as_income: bool,
    /// Tax-free slice taken off rental income before band allocation
    #[serde(default)]
    pub rental_allowance: Decimal,
}

impl TaxYearParams {
    /// Built-in parameters for a tax year
    pub fn for_year(year: TaxYear) -> Self {
        match year.0 {
            // 2024/25 onwards
            2025.. => TaxYearParams {
                year: year.0,
                personal_allowance: dec!(12570),
                age_allowance_65: None,
                age_allowance_75: None,
                age_allowance_limit: None,
                allowance_taper_limit: Some(dec!(100000)),
                low_band: None,
                basic_band: BandParams {
                    width: dec!(37700),
                    rate: dec!(0.20),
                },
                higher_rate: dec!(0.40),
                higher_band_width: Some(dec!(87440)),
                additional_rate: Some(dec!(0.45)),
                dividend_basic_rate: dec!(0.0875),
                dividend_higher_rate: dec!(0.3375),
                dividend_additional_rate: Some(dec!(0.3935)),
                cgt_allowance: dec!(3000),
                cgt_basic_rate: dec!(0.18),
                cgt_higher_rate: dec!(0.24),
                gains_as_income: false,
                rental_allowance: dec!(1000),
            },
            // 2023/24
            2024 => TaxYearParams {
                year: year.0,
                cgt_allowance: dec!(6000),
                cgt_basic_rate: dec!(0.10),
                cgt_higher_rate: dec!(0.20),
                ..TaxYearParams::for_year(TaxYear(2025))
            },
            // 2010/11: age allowances, £100k taper introduced, 50% band
            2011..=2023 => TaxYearParams {
                year: year.0,
                personal_allowance: dec!(6475),
                age_allowance_65: Some(dec!(9490)),
                age_allowance_75: Some(dec!(9640)),
                age_allowance_limit: Some(dec!(22900)),
                allowance_taper_limit: Some(dec!(100000)),
                low_band: None,
                basic_band: BandParams {
                    width: dec!(37400),
                    rate: dec!(0.20),
                },
                higher_rate: dec!(0.40),
                higher_band_width: Some(dec!(112600)),
                additional_rate: Some(dec!(0.50)),
                dividend_basic_rate: dec!(0.10),
                dividend_higher_rate: dec!(0.325),
                dividend_additional_rate: Some(dec!(0.425)),
                cgt_allowance: dec!(10100),
                cgt_basic_rate: dec!(0.18),
                cgt_higher_rate: dec!(0.28),
                gains_as_income: false,
                rental_allowance: Decimal::ZERO,
            },
            // 2007/08 and earlier: 10% starting band, gains taxed as income
            _ => TaxYearParams {
                year: year.0,
                personal_allowance: dec!(5225),
                age_allowance_65: Some(dec!(7550)),
                age_allowance_75: Some(dec!(7690)),
                age_allowance_limit: Some(dec!(20900)),
                allowance_taper_limit: None,
                low_band: Some(BandParams {
                    width: dec!(2230),
                    rate: dec!(0.10),
                }),
                basic_band: BandParams {
                    width: dec!(32370),
                    rate: dec!(0.22),
                },
                higher_rate: dec!(0.40),
                higher_band_width: None,
                additional_rate: None,
                dividend_basic_rate: dec!(0.10),
                dividend_higher_rate: dec!(0.325),
                dividend_additional_rate: None,
                cgt_allowance: dec!(9200),
                cgt_basic_rate: dec!(0.20),
                cgt_higher_rate: dec!(0.40),
                gains_as_income: true,
                rental_allowance: Decimal::ZERO,
            },
        }
    }

    /// Read a parameter set from JSON, overriding the built-in table
    pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}
