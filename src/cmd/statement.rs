//! Statement command - one account's movements over a date window

use crate::cmd::{format_gbp, InputArgs};
use anyhow::bail;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use taxledger::buckets::{BucketKind, Subject};
use taxledger::replay::Analyser;

#[derive(Args, Debug)]
pub struct StatementCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Account to produce the statement for
    #[arg(short = 'A', long)]
    account: String,

    /// Window start (inclusive)
    #[arg(short, long)]
    from: NaiveDate,

    /// Window end (inclusive)
    #[arg(short, long)]
    to: NaiveDate,

    /// Output as JSON instead of a formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled, Serialize)]
struct StatementRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Counterparty")]
    counterparty: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

#[derive(Debug, Serialize)]
struct StatementData {
    account: String,
    from: String,
    to: String,
    opening_balance: String,
    closing_balance: String,
    rows: Vec<StatementRow>,
}

impl StatementCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        if self.to < self.from {
            bail!("statement window ends before it starts");
        }
        let (events, accounts, prices, thresholds) = self.input.load()?;
        if accounts.get(&self.account).is_none() {
            bail!("unknown account {}", self.account);
        }

        let (before, window): (Vec<_>, Vec<_>) = events
            .into_iter()
            .filter(|e| e.date <= self.to)
            .partition(|e| e.date < self.from);

        let mut analyser = Analyser::new(&accounts, &prices, thresholds);
        analyser.process(&before)?;
        let opening = account_balance(&analyser, &self.account);

        // Rewindable: everything after the save-point can be undone, so a
        // longer-lived analysis could continue past the window afterwards.
        let savepoint = analyser.ledger.savepoint();

        let mut rows = Vec::new();
        let mut balance = opening;
        for event in &window {
            analyser.process(std::slice::from_ref(event))?;
            let new_balance = account_balance(&analyser, &self.account);
            if new_balance == balance && event.debit != self.account && event.credit != self.account
            {
                continue;
            }
            let (counterparty, signed) = if event.debit == self.account {
                (event.credit.clone(), -event.amount)
            } else {
                (event.debit.clone(), event.amount)
            };
            balance = new_balance;
            rows.push(StatementRow {
                date: event.date.to_string(),
                category: event.kind.display().to_string(),
                counterparty,
                amount: format_gbp(signed),
                balance: format_gbp(balance),
            });
        }
        let closing = balance;
        analyser.ledger.restore(&savepoint);
        debug_assert_eq!(account_balance(&analyser, &self.account), opening);

        if self.json {
            let data = StatementData {
                account: self.account.clone(),
                from: self.from.to_string(),
                to: self.to.to_string(),
                opening_balance: format!("{:.2}", opening),
                closing_balance: format!("{:.2}", closing),
                rows,
            };
            println!("{}", serde_json::to_string_pretty(&data)?);
            return Ok(());
        }

        println!();
        println!("STATEMENT {} ({} to {})", self.account, self.from, self.to);
        println!();
        println!("Opening balance {}", format_gbp(opening));
        if rows.is_empty() {
            println!("  (no movements)");
        } else {
            let table = Table::new(rows)
                .with(Style::rounded())
                .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
                .to_string();
            println!("{}", table);
        }
        println!("Closing balance {}", format_gbp(closing));
        println!();
        Ok(())
    }
}

fn account_balance(analyser: &Analyser, account: &str) -> Decimal {
    analyser
        .ledger
        .get(BucketKind::AccountBalance, &Subject::Account(account.to_string()))
        .map(|b| b.amount())
        .unwrap_or(Decimal::ZERO)
}
