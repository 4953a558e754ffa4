pub mod report;
pub mod statement;
pub mod tax;

use anyhow::Context;
use clap::Args;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use taxledger::accounts::AccountBook;
use taxledger::config::Thresholds;
use taxledger::events::{self, Event};
use taxledger::prices::PriceBook;

/// Input files shared by every subcommand
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Ledger events file (CSV, or JSON with a .json extension)
    #[arg(short, long)]
    pub events: PathBuf,

    /// Account master data CSV file
    #[arg(short, long)]
    pub accounts: PathBuf,

    /// Unit prices CSV file
    #[arg(short, long)]
    pub prices: Option<PathBuf>,

    /// Thresholds JSON file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl InputArgs {
    pub fn load(&self) -> anyhow::Result<(Vec<Event>, AccountBook, PriceBook, Thresholds)> {
        let events = read_events(&self.events)?;
        let accounts = AccountBook::read_csv(open(&self.accounts)?)
            .with_context(|| format!("reading accounts from {}", self.accounts.display()))?;
        let prices = match &self.prices {
            Some(path) => PriceBook::read_csv(open(path)?)
                .with_context(|| format!("reading prices from {}", path.display()))?,
            None => PriceBook::default(),
        };
        let thresholds = match &self.config {
            Some(path) => Thresholds::read_json(open(path)?)
                .with_context(|| format!("reading config from {}", path.display()))?,
            None => Thresholds::default(),
        };
        Ok((events, accounts, prices, thresholds))
    }
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Read ledger events, picking the format from the file extension
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let reader = open(path)?;
    let events = if path.extension().is_some_and(|ext| ext == "json") {
        events::read_json(reader)
    } else {
        events::read_csv(reader)
    };
    events.with_context(|| format!("reading events from {}", path.display()))
}

pub(crate) fn format_gbp(amount: rust_decimal::Decimal) -> String {
    if amount < rust_decimal::Decimal::ZERO {
        format!("-£{:.2}", amount.abs())
    } else {
        format!("£{:.2}", amount)
    }
}
