use clap::{Parser, Subcommand};

mod cmd;

use cmd::report::ReportCommand;
use cmd::statement::StatementCommand;
use cmd::tax::TaxCommand;

/// Replay a personal transaction ledger into balances, holdings and a tax
/// computation.
#[derive(Parser, Debug)]
#[command(name = "taxledger", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full-ledger analysis: balances, holdings and category totals
    Report(ReportCommand),
    /// One account's movements over a date window
    Statement(StatementCommand),
    /// Tax computation for one tax year
    Tax(TaxCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Report(cmd) => cmd.exec(),
        Command::Statement(cmd) => cmd.exec(),
        Command::Tax(cmd) => cmd.exec(),
    }
}
