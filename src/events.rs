use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Unified JSON input format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerInput {
    pub events: Vec<EventRecord>,
}

/// Transaction category of a ledger event.
///
/// The first block are input categories; the trailing block are derived
/// categories produced during replay (re-categorised income, market movement
/// routing) which may also appear in pre-processed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Salary,
    Pension,
    StateBenefit,
    BenefitInKind,
    Interest,
    Dividend,
    Rental,
    OtherIncome,
    Expense,
    Transfer,
    Inherited,
    TaxFreeIncome,
    TaxPaid,
    GiftIn,
    GiftOut,
    TaxableGain,
    CapitalGain,
    CapitalLoss,
    StockSplit,
    RightsTaken,
    RightsWaived,
    Demerger,
    CashTakeover,
    StockTakeover,
    AdminCharge,
    // Derived during replay
    TaxFreeInterest,
    TaxFreeDividend,
    UnitTrustDividend,
    MarketGrowth,
    MarketShrink,
    BondGain,
}

impl TransactionKind {
    /// Income categories (credit side receives earnings)
    pub fn is_income(self) -> bool {
        matches!(
            self,
            TransactionKind::Salary
                | TransactionKind::Pension
                | TransactionKind::StateBenefit
                | TransactionKind::BenefitInKind
                | TransactionKind::Interest
                | TransactionKind::Dividend
                | TransactionKind::Rental
                | TransactionKind::OtherIncome
                | TransactionKind::TaxFreeIncome
                | TransactionKind::TaxFreeInterest
                | TransactionKind::TaxFreeDividend
                | TransactionKind::UnitTrustDividend
                | TransactionKind::BondGain
        )
    }

    /// Categories that add units and cost to a priced holding
    pub fn is_transfer_in_like(self) -> bool {
        matches!(
            self,
            TransactionKind::Transfer
                | TransactionKind::RightsTaken
                | TransactionKind::Inherited
                | TransactionKind::TaxFreeIncome
                | TransactionKind::GiftIn
        )
    }

    /// Categories that dispose of units from a priced holding
    pub fn is_disposal_like(self) -> bool {
        matches!(
            self,
            TransactionKind::Transfer | TransactionKind::GiftOut | TransactionKind::TaxableGain
        )
    }

    pub fn display(&self) -> &'static str {
        match self {
            TransactionKind::Salary => "Salary",
            TransactionKind::Pension => "Pension",
            TransactionKind::StateBenefit => "StateBenefit",
            TransactionKind::BenefitInKind => "BenefitInKind",
            TransactionKind::Interest => "Interest",
            TransactionKind::Dividend => "Dividend",
            TransactionKind::Rental => "Rental",
            TransactionKind::OtherIncome => "OtherIncome",
            TransactionKind::Expense => "Expense",
            TransactionKind::Transfer => "Transfer",
            TransactionKind::Inherited => "Inherited",
            TransactionKind::TaxFreeIncome => "TaxFreeIncome",
            TransactionKind::TaxPaid => "TaxPaid",
            TransactionKind::GiftIn => "GiftIn",
            TransactionKind::GiftOut => "GiftOut",
            TransactionKind::TaxableGain => "TaxableGain",
            TransactionKind::CapitalGain => "CapitalGain",
            TransactionKind::CapitalLoss => "CapitalLoss",
            TransactionKind::StockSplit => "StockSplit",
            TransactionKind::RightsTaken => "RightsTaken",
            TransactionKind::RightsWaived => "RightsWaived",
            TransactionKind::Demerger => "Demerger",
            TransactionKind::CashTakeover => "CashTakeover",
            TransactionKind::StockTakeover => "StockTakeover",
            TransactionKind::AdminCharge => "AdminCharge",
            TransactionKind::TaxFreeInterest => "TaxFreeInterest",
            TransactionKind::TaxFreeDividend => "TaxFreeDividend",
            TransactionKind::UnitTrustDividend => "UnitTrustDividend",
            TransactionKind::MarketGrowth => "MarketGrowth",
            TransactionKind::MarketShrink => "MarketShrink",
            TransactionKind::BondGain => "BondGain",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// A ledger event between two accounts
#[derive(Debug, Clone)]
pub struct Event {
    pub date: NaiveDate,
    pub kind: TransactionKind,
    /// Account value leaves
    pub debit: String,
    /// Account value arrives
    pub credit: String,
    pub amount: Decimal,
    /// Unit quantity for priced-asset events
    pub units: Option<Decimal>,
    /// Tax withheld/credited at source
    pub tax_credit: Option<Decimal>,
    /// Cost split ratio for demergers
    pub dilution: Option<Decimal>,
    /// Qualifying years for chargeable (taxable gain) events
    pub qualifying_years: Option<u32>,
    pub description: Option<String>,
}

impl Event {
    /// Gross amount including any tax credited at source
    pub fn gross_amount(&self) -> Decimal {
        self.amount + self.tax_credit.unwrap_or(Decimal::ZERO)
    }
}

/// CSV/JSON record format for ledger events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub debit: String,
    pub credit: String,
    pub amount: Decimal,
    #[serde(default)]
    pub units: Option<Decimal>,
    #[serde(default)]
    pub tax_credit: Option<Decimal>,
    #[serde(default)]
    pub dilution: Option<Decimal>,
    #[serde(default)]
    pub qualifying_years: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<EventRecord> for Event {
    fn from(record: EventRecord) -> Self {
        Event {
            date: record.date,
            kind: record.kind,
            debit: record.debit,
            credit: record.credit,
            amount: record.amount,
            units: record.units,
            tax_credit: record.tax_credit,
            dilution: record.dilution,
            qualifying_years: record.qualifying_years,
            description: record.description,
        }
    }
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        EventRecord {
            date: event.date,
            kind: event.kind,
            debit: event.debit.clone(),
            credit: event.credit.clone(),
            amount: event.amount,
            units: event.units,
            tax_credit: event.tax_credit,
            dilution: event.dilution,
            qualifying_years: event.qualifying_years,
            description: event.description.clone(),
        }
    }
}

/// Read ledger events from CSV, sorted by date
pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Event>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let records: Result<Vec<EventRecord>, _> = rdr.deserialize::<EventRecord>().collect();
    let mut events: Vec<Event> = records?.into_iter().map(Into::into).collect();
    events.sort_by_key(|e| e.date);
    Ok(events)
}

/// Read ledger events from JSON, sorted by date
pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Vec<Event>> {
    let input: LedgerInput = serde_json::from_reader(reader)?;
    let mut events: Vec<Event> = input.events.into_iter().map(Into::into).collect();
    events.sort_by_key(|e| e.date);
    Ok(events)
}
