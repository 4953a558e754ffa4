use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;

/// Market price of one unit of a priced account's asset on a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub account: String,
    pub date: NaiveDate,
    pub price: Decimal,
}

/// Price history per priced account, queryable for the latest price at or
/// before a date. Missing data is reported to the caller as `None`, never
/// silently substituted with zero.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<String, Vec<Price>>,
}

impl PriceBook {
    pub fn new(mut prices: Vec<Price>) -> Self {
        prices.sort_by_key(|p| p.date);
        let mut map: HashMap<String, Vec<Price>> = HashMap::new();
        for price in prices {
            map.entry(price.account.clone()).or_default().push(price);
        }
        PriceBook { prices: map }
    }

    pub fn add(&mut self, price: Price) {
        let series = self.prices.entry(price.account.clone()).or_default();
        series.push(price);
        series.sort_by_key(|p| p.date);
    }

    /// Latest price at or before `at` for the account, if any
    pub fn latest(&self, account: &str, at: NaiveDate) -> Option<Decimal> {
        self.prices.get(account).and_then(|series| {
            series
                .iter()
                .rev()
                .find(|price| price.date <= at)
                .map(|price| price.price)
        })
    }

    /// Read prices from CSV
    pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let records: Result<Vec<Price>, _> = rdr.deserialize::<Price>().collect();
        Ok(PriceBook::new(records?))
    }
}

/// Interest rate on a date; consumed by callers computing accruals
/// (out of scope for the replay core itself).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub account: String,
    pub date: NaiveDate,
    pub rate: Decimal,
}

/// Interest rate history per account, same at-or-before lookup as prices
#[derive(Debug, Clone, Default)]
pub struct RateBook {
    rates: HashMap<String, Vec<Rate>>,
}

impl RateBook {
    pub fn new(mut rates: Vec<Rate>) -> Self {
        rates.sort_by_key(|r| r.date);
        let mut map: HashMap<String, Vec<Rate>> = HashMap::new();
        for rate in rates {
            map.entry(rate.account.clone()).or_default().push(rate);
        }
        RateBook { rates: map }
    }

    pub fn latest(&self, account: &str, at: NaiveDate) -> Option<Decimal> {
        self.rates.get(account).and_then(|series| {
            series
                .iter()
                .rev()
                .find(|rate| rate.date <= at)
                .map(|rate| rate.rate)
        })
    }

    pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let records: Result<Vec<Rate>, _> = rdr.deserialize::<Rate>().collect();
        Ok(RateBook::new(records?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn price(account: &str, on: &str, value: Decimal) -> Price {
        Price {
            account: account.to_string(),
            date: date(on),
            price: value,
        }
    }

    #[test]
    fn latest_at_or_before() {
        let book = PriceBook::new(vec![
            price("shares:acme", "2024-01-01", dec!(1.00)),
            price("shares:acme", "2024-02-01", dec!(1.10)),
            price("shares:acme", "2024-03-01", dec!(1.20)),
        ]);

        assert_eq!(book.latest("shares:acme", date("2024-02-15")), Some(dec!(1.10)));
        assert_eq!(book.latest("shares:acme", date("2024-02-01")), Some(dec!(1.10)));
        assert_eq!(book.latest("shares:acme", date("2024-06-01")), Some(dec!(1.20)));
    }

    #[test]
    fn missing_price_is_none() {
        let book = PriceBook::new(vec![price("shares:acme", "2024-03-01", dec!(1.20))]);
        assert_eq!(book.latest("shares:acme", date("2024-01-15")), None);
        assert_eq!(book.latest("shares:other", date("2024-06-01")), None);
    }

    #[test]
    fn read_prices_csv() {
        let csv_data = r#"account,date,price
shares:acme,2024-01-01,1.00
shares:acme,2024-03-01,1.20"#;

        let book = PriceBook::read_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(book.latest("shares:acme", date("2024-04-01")), Some(dec!(1.20)));
    }

    #[test]
    fn rate_lookup() {
        let book = RateBook::new(vec![
            Rate {
                account: "savings".to_string(),
                date: date("2024-01-01"),
                rate: dec!(0.04),
            },
            Rate {
                account: "savings".to_string(),
                date: date("2024-07-01"),
                rate: dec!(0.045),
            },
        ]);
        assert_eq!(book.latest("savings", date("2024-06-30")), Some(dec!(0.04)));
        assert_eq!(book.latest("savings", date("2024-07-01")), Some(dec!(0.045)));
    }
}
