//! Tax command - tax-year computation with band and category breakdown

use crate::cmd::{format_gbp, InputArgs};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use taxledger::analysis::Analysis;
use taxledger::tax::{TaxYear, TaxYearParams};

#[derive(Args, Debug)]
pub struct TaxCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Tax year end (e.g. 2025 for 2024/25)
    #[arg(short, long)]
    year: i32,

    /// Birth date, for age-related allowances
    #[arg(short, long)]
    birth_date: Option<NaiveDate>,

    /// Tax year parameters JSON file, overriding the built-in table
    #[arg(long)]
    params: Option<PathBuf>,

    /// Output as JSON instead of formatted tables
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Gross")]
    gross: String,
    #[tabled(rename = "Taxable")]
    taxable: String,
    #[tabled(rename = "Tax")]
    tax: String,
}

#[derive(Debug, Clone, Tabled)]
struct AllocationRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Tax")]
    tax: String,
}

#[derive(Debug, Serialize)]
struct TaxData {
    tax_year: String,
    personal_allowance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    applicable_age: Option<i32>,
    allowance_reduced: bool,
    gains_sliced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    chargeable_credit: Option<String>,
    categories: Vec<CategoryData>,
    total_tax: String,
    tax_paid: String,
    tax_owed: String,
}

#[derive(Debug, Serialize)]
struct CategoryData {
    category: String,
    gross: String,
    taxable: String,
    tax: String,
}

impl TaxCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (events, accounts, prices, thresholds) = self.input.load()?;
        let year = TaxYear(self.year);
        let params = match &self.params {
            Some(path) => TaxYearParams::read_json(BufReader::new(File::open(path)?))?,
            None => TaxYearParams::for_year(year),
        };
        let age = self.birth_date.map(|born| year.age_at_end(born));

        let window: Vec<_> = events
            .into_iter()
            .filter(|e| e.date >= year.start_date() && e.date <= year.end_date())
            .collect();

        let mut analysis = Analysis::new(&accounts, &prices, thresholds, year.end_date());
        analysis.process(&window)?;
        let computation = analysis.tax(&params, year, age).clone();

        if self.json {
            let data = TaxData {
                tax_year: year.display(),
                personal_allowance: format!("{:.2}", computation.allowances.personal),
                applicable_age: computation.allowances.applicable_age,
                allowance_reduced: computation.allowances.allowance_reduced,
                gains_sliced: computation.gains_sliced,
                chargeable_credit: (!computation.chargeable.is_empty())
                    .then(|| format!("{:.2}", computation.chargeable.total_credit())),
                categories: computation
                    .categories
                    .iter()
                    .map(|c| CategoryData {
                        category: c.category.display().to_string(),
                        gross: format!("{:.2}", c.gross),
                        taxable: format!("{:.2}", c.taxable),
                        tax: format!("{:.2}", c.tax),
                    })
                    .collect(),
                total_tax: format!("{:.2}", computation.total_tax),
                tax_paid: format!("{:.2}", computation.tax_paid),
                tax_owed: format!("{:.2}", computation.tax_owed()),
            };
            println!("{}", serde_json::to_string_pretty(&data)?);
            return Ok(());
        }

        println!();
        println!("TAX COMPUTATION ({})", year.display());
        println!();
        print!(
            "Personal allowance {}",
            format_gbp(computation.allowances.personal)
        );
        if let Some(age) = computation.allowances.applicable_age {
            print!(" (age {} tier)", age);
        }
        if computation.allowances.allowance_reduced {
            print!(" (tapered)");
        }
        println!();
        println!();

        let category_rows: Vec<CategoryRow> = computation
            .categories
            .iter()
            .map(|c| CategoryRow {
                category: c.category.display().to_string(),
                gross: format_gbp(c.gross),
                taxable: format_gbp(c.taxable),
                tax: format_gbp(c.tax),
            })
            .collect();
        println!("{}", table(category_rows));
        println!();

        let allocation_rows: Vec<AllocationRow> = computation
            .categories
            .iter()
            .flat_map(|c| {
                c.allocations.iter().map(|a| AllocationRow {
                    category: c.category.display().to_string(),
                    band: a.band.display().to_string(),
                    amount: format_gbp(a.amount),
                    rate: format_rate(a.rate),
                    tax: format_gbp(a.tax.round_dp(2)),
                })
            })
            .collect();
        if !allocation_rows.is_empty() {
            println!("{}", table(allocation_rows));
            println!();
        }

        if computation.gains_sliced {
            println!("Chargeable gains taxed with top-slicing relief");
        }
        if !computation.chargeable.is_empty() {
            println!(
                "Chargeable event tax credited at source {}",
                format_gbp(computation.chargeable.total_credit())
            );
        }
        println!(
            "Total tax {} | Paid {} | Owed {}",
            format_gbp(computation.total_tax),
            format_gbp(computation.tax_paid),
            format_gbp(computation.tax_owed())
        );

        for warning in analysis.warnings() {
            eprintln!("warning: {}", warning);
        }
        println!();
        Ok(())
    }
}

fn table<R: Tabled>(rows: Vec<R>) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}

fn format_rate(rate: Decimal) -> String {
    format!("{:.2}%", rate * dec!(100))
}
