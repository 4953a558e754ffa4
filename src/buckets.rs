use crate::accounts::AccountClass;
use crate::capital::{Attr, CapitalEvent, CapitalLedger};
use crate::events::TransactionKind;
use crate::tax::TaxCategory;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Kind of aggregation bucket; together with the subject it forms the
/// ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    /// Running balance of one internal account
    AccountBalance,
    /// Priced holding detail (units, cost, gains) with its capital history
    AssetDetail,
    /// Income/expense totals against one external counterparty
    ExternalParty,
    /// Total per transaction category
    CategoryTotal,
    /// Gross income per tax category, consumed by the tax engine
    TaxCategoryTotal,
    /// Roll-up per account class
    ClassSummary,
}

/// Subject identity of a bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Account(String),
    Class(AccountClass),
    Category(TransactionKind),
    Tax(TaxCategory),
}

impl Subject {
    pub fn display(&self) -> String {
        match self {
            Subject::Account(id) => id.clone(),
            Subject::Class(class) => class.display().to_string(),
            Subject::Category(kind) => kind.display().to_string(),
            Subject::Tax(category) => category.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub kind: BucketKind,
    pub subject: Subject,
}

/// Mutable totals of a priced holding, plus its capital event history
#[derive(Debug, Clone, Default)]
pub struct HoldingTotals {
    pub units: Decimal,
    pub cost: Decimal,
    /// Net money put in this period (purchases − proceeds)
    pub invested: Decimal,
    pub dividends: Decimal,
    pub realized_gains: Decimal,
    /// Market value at the last valuation
    pub value: Decimal,
    /// Cumulative realized gains + dividends over the holding's life
    pub gained: Decimal,
    pub history: CapitalLedger,
}

impl HoldingTotals {
    /// Open a capital event entry recording the holding's initial state
    pub fn begin_entry(&self, date: NaiveDate, kind: Option<TransactionKind>) -> CapitalEvent {
        let mut entry = CapitalEvent::new(date, kind);
        entry.set(Attr::UnitsInitial, self.units);
        entry.set(Attr::CostInitial, self.cost);
        entry.set(Attr::GainsInitial, self.realized_gains);
        entry
    }

    /// Record the final state and append the entry to the history
    pub fn close_entry(&mut self, mut entry: CapitalEvent) {
        entry.set(Attr::UnitsFinal, self.units);
        entry.set(Attr::CostFinal, self.cost);
        entry.set(Attr::GainsFinal, self.realized_gains);
        self.history.push(entry);
    }
}

/// Tagged-union payload of a bucket, determined by its kind
#[derive(Debug, Clone)]
pub enum Totals {
    Amount(Decimal),
    Holding(HoldingTotals),
    External { income: Decimal, expense: Decimal },
}

impl Totals {
    fn zeroed(kind: BucketKind) -> Totals {
        match kind {
            BucketKind::AssetDetail => Totals::Holding(HoldingTotals::default()),
            BucketKind::ExternalParty => Totals::External {
                income: Decimal::ZERO,
                expense: Decimal::ZERO,
            },
            _ => Totals::Amount(Decimal::ZERO),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Totals::Amount(amount) => amount.is_zero(),
            Totals::Holding(h) => {
                h.units.is_zero() && h.cost.is_zero() && h.value.is_zero() && h.invested.is_zero()
            }
            Totals::External { income, expense } => income.is_zero() && expense.is_zero(),
        }
    }

    /// Frozen summary used as the prior-period back-reference
    pub fn to_base(&self) -> BaseTotals {
        match self {
            Totals::Amount(amount) => BaseTotals {
                balance: *amount,
                ..Default::default()
            },
            Totals::Holding(h) => BaseTotals {
                balance: h.value,
                units: h.units,
                value: h.value,
                gained: h.gained,
            },
            Totals::External { income, expense } => BaseTotals {
                balance: income - expense,
                ..Default::default()
            },
        }
    }
}

/// Read-only snapshot of the equivalent bucket from the prior comparison
/// period. Never mutated by the current pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseTotals {
    pub balance: Decimal,
    pub units: Decimal,
    pub value: Decimal,
    pub gained: Decimal,
}

impl BaseTotals {
    pub fn is_zero(&self) -> bool {
        self.balance.is_zero() && self.units.is_zero() && self.value.is_zero()
    }
}

/// One aggregation record: (kind, subject) key, mutable totals, optional
/// prior-period base.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub key: BucketKey,
    pub totals: Totals,
    pub base: Option<BaseTotals>,
}

impl Bucket {
    fn new(key: BucketKey, base: Option<BaseTotals>) -> Self {
        let totals = Totals::zeroed(key.kind);
        Bucket { key, totals, base }
    }

    pub fn amount(&self) -> Decimal {
        match &self.totals {
            Totals::Amount(amount) => *amount,
            Totals::Holding(h) => h.value,
            Totals::External { income, expense } => income - expense,
        }
    }

    pub fn add(&mut self, amount: Decimal) {
        match &mut self.totals {
            Totals::Amount(total) => {
                *total += amount;
                log::debug!(
                    "Bucket {} ADD {}: total {}",
                    self.key.subject.display(),
                    amount,
                    total
                );
            }
            _ => unreachable!("plain amount bucket expected"),
        }
    }

    pub fn subtract(&mut self, amount: Decimal) {
        self.add(-amount);
    }

    pub fn add_income(&mut self, amount: Decimal) {
        match &mut self.totals {
            Totals::External { income, .. } => *income += amount,
            _ => unreachable!("external party bucket expected"),
        }
    }

    pub fn add_expense(&mut self, amount: Decimal) {
        match &mut self.totals {
            Totals::External { expense, .. } => *expense += amount,
            _ => unreachable!("external party bucket expected"),
        }
    }

    pub fn holding(&self) -> &HoldingTotals {
        match &self.totals {
            Totals::Holding(h) => h,
            _ => unreachable!("asset detail bucket expected"),
        }
    }

    pub fn holding_mut(&mut self) -> &mut HoldingTotals {
        match &mut self.totals {
            Totals::Holding(h) => h,
            _ => unreachable!("asset detail bucket expected"),
        }
    }

    pub fn base(&self) -> BaseTotals {
        self.base.unwrap_or_default()
    }

    /// Carried into the next period? Asset detail is always kept while
    /// units remain.
    fn is_active(&self) -> bool {
        if let Totals::Holding(h) = &self.totals {
            if !h.units.is_zero() {
                return true;
            }
        }
        !self.totals.is_zero() || self.base.is_some_and(|b| !b.is_zero())
    }

    fn snapshot(&self) -> TotalsSnapshot {
        match &self.totals {
            Totals::Amount(amount) => TotalsSnapshot::Amount(*amount),
            Totals::Holding(h) => TotalsSnapshot::Holding {
                units: h.units,
                cost: h.cost,
                invested: h.invested,
                dividends: h.dividends,
                realized_gains: h.realized_gains,
                value: h.value,
                gained: h.gained,
                history_len: h.history.len(),
            },
            Totals::External { income, expense } => TotalsSnapshot::External {
                income: *income,
                expense: *expense,
            },
        }
    }

    fn restore(&mut self, snapshot: &TotalsSnapshot) {
        match (&mut self.totals, snapshot) {
            (Totals::Amount(total), TotalsSnapshot::Amount(saved)) => *total = *saved,
            (
                Totals::Holding(h),
                TotalsSnapshot::Holding {
                    units,
                    cost,
                    invested,
                    dividends,
                    realized_gains,
                    value,
                    gained,
                    history_len,
                },
            ) => {
                h.units = *units;
                h.cost = *cost;
                h.invested = *invested;
                h.dividends = *dividends;
                h.realized_gains = *realized_gains;
                h.value = *value;
                h.gained = *gained;
                h.history.truncate(*history_len);
            }
            (
                Totals::External { income, expense },
                TotalsSnapshot::External {
                    income: saved_income,
                    expense: saved_expense,
                },
            ) => {
                *income = *saved_income;
                *expense = *saved_expense;
            }
            _ => unreachable!("snapshot shape matches bucket kind"),
        }
    }
}

/// Snapshot of a bucket's mutable fields taken at a save-point
#[derive(Debug, Clone)]
enum TotalsSnapshot {
    Amount(Decimal),
    Holding {
        units: Decimal,
        cost: Decimal,
        invested: Decimal,
        dividends: Decimal,
        realized_gains: Decimal,
        value: Decimal,
        gained: Decimal,
        history_len: usize,
    },
    External {
        income: Decimal,
        expense: Decimal,
    },
}

/// Save-point over a whole ledger: restores every mutated bucket field and
/// truncates capital histories recorded after the snapshot.
#[derive(Debug, Clone)]
pub struct Savepoint {
    snapshots: Vec<(BucketKey, TotalsSnapshot)>,
}

/// The bucket ledger: one aggregation record per (kind, subject) key,
/// created lazily, linked to the prior period's equivalents.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    buckets: HashMap<BucketKey, Bucket>,
    bases: HashMap<BucketKey, BaseTotals>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    /// New ledger for the next period: a fresh zeroed bucket (linked to the
    /// old one as base) for every subject still active in the prior ledger.
    /// Inactive prior subjects remain linkable on first reference.
    pub fn roll_forward(prior: &Ledger) -> Ledger {
        let mut next = Ledger::new();
        for (key, bucket) in &prior.buckets {
            next.bases.insert(key.clone(), bucket.totals.to_base());
        }
        for (key, bucket) in &prior.buckets {
            if bucket.is_active() {
                let base = next.bases.get(key).copied();
                let mut fresh = Bucket::new(key.clone(), base);
                // A holding's position carries across periods; only the
                // period flows (invested, dividends, realized, history)
                // start from zero.
                if let (Totals::Holding(carried), Totals::Holding(prior)) =
                    (&mut fresh.totals, &bucket.totals)
                {
                    carried.units = prior.units;
                    carried.cost = prior.cost;
                    carried.gained = prior.gained;
                }
                next.buckets.insert(key.clone(), fresh);
            }
        }
        next
    }

    /// Get or lazily create the bucket for (kind, subject), zeroed and
    /// linked to the prior period's equivalent if one existed.
    pub fn get_or_create(&mut self, kind: BucketKind, subject: Subject) -> &mut Bucket {
        let key = BucketKey { kind, subject };
        let base = self.bases.get(&key).copied();
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Bucket::new(key, base))
    }

    pub fn get(&self, kind: BucketKind, subject: &Subject) -> Option<&Bucket> {
        self.buckets.get(&BucketKey {
            kind,
            subject: subject.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop buckets whose current and prior values are both zero, once
    /// totals are final. Asset detail with live units is always retained.
    pub fn prune(&mut self) {
        self.buckets.retain(|key, bucket| {
            let keep = bucket.is_active();
            if !keep {
                log::debug!("Pruning empty bucket {}", key.subject.display());
            }
            keep
        });
    }

    /// Snapshot the mutable fields of every bucket
    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            snapshots: self
                .buckets
                .iter()
                .map(|(key, bucket)| (key.clone(), bucket.snapshot()))
                .collect(),
        }
    }

    /// Return every bucket to its save-point state; buckets created since
    /// the save-point are dropped.
    pub fn restore(&mut self, savepoint: &Savepoint) {
        let saved: HashMap<&BucketKey, &TotalsSnapshot> = savepoint
            .snapshots
            .iter()
            .map(|(key, snapshot)| (key, snapshot))
            .collect();
        self.buckets.retain(|key, _| saved.contains_key(key));
        for (key, snapshot) in &savepoint.snapshots {
            if let Some(bucket) = self.buckets.get_mut(key) {
                bucket.restore(snapshot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account_subject(id: &str) -> Subject {
        Subject::Account(id.to_string())
    }

    #[test]
    fn get_or_create_zeroed() {
        let mut ledger = Ledger::new();
        let bucket = ledger.get_or_create(BucketKind::AccountBalance, account_subject("bank"));
        assert_eq!(bucket.amount(), Decimal::ZERO);
        assert!(bucket.base.is_none());

        bucket.add(dec!(100));
        let again = ledger.get_or_create(BucketKind::AccountBalance, account_subject("bank"));
        assert_eq!(again.amount(), dec!(100));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn roll_forward_links_base_and_keeps_active() {
        let mut prior = Ledger::new();
        prior
            .get_or_create(BucketKind::AccountBalance, account_subject("bank"))
            .add(dec!(250));
        prior
            .get_or_create(BucketKind::AccountBalance, account_subject("empty"))
            .add(Decimal::ZERO);

        let next = Ledger::roll_forward(&prior);

        let bank = next
            .get(BucketKind::AccountBalance, &account_subject("bank"))
            .expect("active bucket carried forward");
        assert_eq!(bank.amount(), Decimal::ZERO);
        assert_eq!(bank.base().balance, dec!(250));

        assert!(next
            .get(BucketKind::AccountBalance, &account_subject("empty"))
            .is_none());
    }

    #[test]
    fn roll_forward_keeps_holdings_with_units() {
        let mut prior = Ledger::new();
        {
            let holding = prior
                .get_or_create(BucketKind::AssetDetail, account_subject("shares"))
                .holding_mut();
            holding.units = dec!(1000);
            holding.cost = dec!(1000);
        }

        let next = Ledger::roll_forward(&prior);
        let carried = next
            .get(BucketKind::AssetDetail, &account_subject("shares"))
            .expect("holding carried forward");
        assert_eq!(carried.base().units, dec!(1000));
        // Position carries; period flows start over
        assert_eq!(carried.holding().units, dec!(1000));
        assert_eq!(carried.holding().cost, dec!(1000));
        assert_eq!(carried.holding().invested, Decimal::ZERO);
        assert!(carried.holding().history.is_empty());
    }

    #[test]
    fn lazily_created_bucket_links_prior_base() {
        let mut prior = Ledger::new();
        {
            let holding = prior
                .get_or_create(BucketKind::AssetDetail, account_subject("shares"))
                .holding_mut();
            holding.value = dec!(500);
            holding.units = Decimal::ZERO;
        }
        // value but no units: still active, but exercise lazy linking via
        // a category bucket that was inactive
        prior
            .get_or_create(BucketKind::CategoryTotal, Subject::Category(TransactionKind::Salary))
            .add(dec!(10));

        let mut next = Ledger::roll_forward(&prior);
        let salary = next.get_or_create(
            BucketKind::CategoryTotal,
            Subject::Category(TransactionKind::Salary),
        );
        assert_eq!(salary.base().balance, dec!(10));
    }

    #[test]
    fn prune_drops_doubly_zero_buckets() {
        let mut ledger = Ledger::new();
        ledger
            .get_or_create(BucketKind::AccountBalance, account_subject("bank"))
            .add(dec!(100));
        ledger.get_or_create(BucketKind::AccountBalance, account_subject("unused"));

        ledger.prune();
        assert_eq!(ledger.len(), 1);
        assert!(ledger
            .get(BucketKind::AccountBalance, &account_subject("bank"))
            .is_some());
    }

    #[test]
    fn savepoint_round_trip() {
        let mut ledger = Ledger::new();
        ledger
            .get_or_create(BucketKind::AccountBalance, account_subject("bank"))
            .add(dec!(100));
        {
            let holding = ledger
                .get_or_create(BucketKind::AssetDetail, account_subject("shares"))
                .holding_mut();
            holding.units = dec!(10);
            holding.cost = dec!(50);
        }

        let savepoint = ledger.savepoint();

        // Mutate everything and add a new bucket
        ledger
            .get_or_create(BucketKind::AccountBalance, account_subject("bank"))
            .add(dec!(999));
        {
            let holding = ledger
                .get_or_create(BucketKind::AssetDetail, account_subject("shares"))
                .holding_mut();
            holding.units = dec!(99);
            let entry = holding.begin_entry(
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                Some(TransactionKind::Transfer),
            );
            holding.close_entry(entry);
        }
        ledger
            .get_or_create(BucketKind::AccountBalance, account_subject("new"))
            .add(dec!(1));

        ledger.restore(&savepoint);

        assert_eq!(
            ledger
                .get(BucketKind::AccountBalance, &account_subject("bank"))
                .unwrap()
                .amount(),
            dec!(100)
        );
        let holding = ledger
            .get(BucketKind::AssetDetail, &account_subject("shares"))
            .unwrap()
            .holding();
        assert_eq!(holding.units, dec!(10));
        assert!(holding.history.is_empty());
        assert!(ledger
            .get(BucketKind::AccountBalance, &account_subject("new"))
            .is_none());
    }
}
