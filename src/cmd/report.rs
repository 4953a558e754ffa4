//! Report command - full-ledger analysis with balances, holdings and totals

use crate::cmd::{format_gbp, InputArgs};
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use taxledger::analysis::Analysis;
use taxledger::buckets::{BucketKind, Subject, Totals};

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Valuation date; defaults to the last event date
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Output as JSON instead of formatted tables
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct BalanceRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

#[derive(Debug, Clone, Tabled)]
struct HoldingRow {
    #[tabled(rename = "Holding")]
    account: String,
    #[tabled(rename = "Units")]
    units: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Gained")]
    gained: String,
}

#[derive(Debug, Clone, Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Total")]
    total: String,
}

#[derive(Debug, Serialize)]
struct ReportData {
    period_end: String,
    balances: Vec<BalanceData>,
    holdings: Vec<HoldingData>,
    categories: Vec<CategoryData>,
    income: String,
    expense: String,
    profit: String,
    net_worth: String,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BalanceData {
    account: String,
    balance: String,
}

#[derive(Debug, Serialize)]
struct HoldingData {
    account: String,
    units: String,
    cost: String,
    value: String,
    gained: String,
}

#[derive(Debug, Serialize)]
struct CategoryData {
    category: String,
    total: String,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (events, accounts, prices, thresholds) = self.input.load()?;
        let period_end = self
            .date
            .or_else(|| events.last().map(|e| e.date))
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        let mut analysis = Analysis::new(&accounts, &prices, thresholds, period_end);
        analysis.process(&events)?;
        let summary = analysis.totals().clone();

        let mut balances = Vec::new();
        let mut holdings = Vec::new();
        for bucket in analysis.ledger().iter() {
            match (&bucket.key.kind, &bucket.key.subject, &bucket.totals) {
                (BucketKind::AccountBalance, Subject::Account(id), Totals::Amount(amount)) => {
                    balances.push((id.clone(), *amount));
                }
                (BucketKind::AssetDetail, Subject::Account(id), Totals::Holding(h)) => {
                    holdings.push((id.clone(), h.units, h.cost, h.value, h.gained));
                }
                _ => {}
            }
        }
        balances.sort_by(|a, b| a.0.cmp(&b.0));
        holdings.sort_by(|a, b| a.0.cmp(&b.0));

        if self.json {
            let data = ReportData {
                period_end: period_end.to_string(),
                balances: balances
                    .iter()
                    .map(|(account, balance)| BalanceData {
                        account: account.clone(),
                        balance: format!("{:.2}", balance),
                    })
                    .collect(),
                holdings: holdings
                    .iter()
                    .map(|(account, units, cost, value, gained)| HoldingData {
                        account: account.clone(),
                        units: units.to_string(),
                        cost: format!("{:.2}", cost),
                        value: format!("{:.2}", value),
                        gained: format!("{:.2}", gained),
                    })
                    .collect(),
                categories: summary
                    .categories
                    .iter()
                    .map(|(kind, total)| CategoryData {
                        category: kind.display().to_string(),
                        total: format!("{:.2}", total),
                    })
                    .collect(),
                income: format!("{:.2}", summary.income),
                expense: format!("{:.2}", summary.expense),
                profit: format!("{:.2}", summary.profit()),
                net_worth: format!("{:.2}", summary.net_worth()),
                warnings: analysis.warnings().iter().map(|w| w.to_string()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&data)?);
            return Ok(());
        }

        println!();
        println!("LEDGER REPORT (to {})", period_end);
        println!();

        if !balances.is_empty() {
            let rows: Vec<BalanceRow> = balances
                .iter()
                .map(|(account, balance)| BalanceRow {
                    account: account.clone(),
                    balance: format_gbp(*balance),
                })
                .collect();
            println!("{}", table(rows));
            println!();
        }

        if !holdings.is_empty() {
            let rows: Vec<HoldingRow> = holdings
                .iter()
                .map(|(account, units, cost, value, gained)| HoldingRow {
                    account: account.clone(),
                    units: units.to_string(),
                    cost: format_gbp(*cost),
                    value: format_gbp(*value),
                    gained: format_gbp(*gained),
                })
                .collect();
            println!("{}", table(rows));
            println!();
        }

        if !summary.categories.is_empty() {
            let rows: Vec<CategoryRow> = summary
                .categories
                .iter()
                .map(|(kind, total)| CategoryRow {
                    category: kind.display().to_string(),
                    total: format_gbp(*total),
                })
                .collect();
            println!("{}", table(rows));
            println!();
        }

        println!(
            "Income {} | Expense {} | Profit {}",
            format_gbp(summary.income),
            format_gbp(summary.expense),
            format_gbp(summary.profit())
        );
        println!("Net worth {}", format_gbp(summary.net_worth()));

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
