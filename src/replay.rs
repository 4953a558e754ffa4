use crate::accounts::{Account, AccountBook};
use crate::buckets::{BucketKind, Ledger, Subject};
use crate::capital::Attr;
use crate::config::Thresholds;
use crate::events::{Event, TransactionKind};
use crate::prices::PriceBook;
use crate::tax::{ChargeableEvent, ChargeablePool, TaxCategory};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Well-known external party receiving tax credits and payments
pub const TAX_AUTHORITY: &str = "tax-authority";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("unhandled transaction kind {kind} on priced account {account} at {date}")]
    UnhandledKind {
        kind: TransactionKind,
        account: String,
        date: NaiveDate,
    },
    #[error("unknown account {0}")]
    UnknownAccount(String),
}

/// Non-fatal data gaps found during replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    MissingPrice { account: String, date: NaiveDate },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MissingPrice { account, date } => {
                write!(f, "no price for {} at {}", account, date)
            }
        }
    }
}

/// Replays a date-ordered ledger into the bucket ledger, maintaining the
/// capital event trail per priced holding and pooling chargeable gains.
pub struct Analyser<'a> {
    accounts: &'a AccountBook,
    prices: &'a PriceBook,
    thresholds: Thresholds,
    pub ledger: Ledger,
    pub chargeables: ChargeablePool,
    pub warnings: Vec<Warning>,
    /// Tax credited or paid at source over the replayed period
    pub tax_paid: Decimal,
}

impl<'a> Analyser<'a> {
    pub fn new(accounts: &'a AccountBook, prices: &'a PriceBook, thresholds: Thresholds) -> Self {
        Analyser {
            accounts,
            prices,
            thresholds,
            ledger: Ledger::new(),
            chargeables: ChargeablePool::default(),
            warnings: Vec::new(),
            tax_paid: Decimal::ZERO,
        }
    }

    /// Continue into a new period with buckets rolled forward from a prior
    /// pass.
    pub fn with_ledger(
        accounts: &'a AccountBook,
        prices: &'a PriceBook,
        thresholds: Thresholds,
        ledger: Ledger,
    ) -> Self {
        Analyser {
            ledger,
            ..Analyser::new(accounts, prices, thresholds)
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn process(&mut self, events: &[Event]) -> Result<(), ReplayError> {
        for event in events {
            self.apply(event)?;
        }
        Ok(())
    }

    fn account(&self, id: &str) -> Result<Account, ReplayError> {
        self.accounts
            .get(id)
            .cloned()
            .ok_or_else(|| ReplayError::UnknownAccount(id.to_string()))
    }

    fn apply(&mut self, event: &Event) -> Result<(), ReplayError> {
        let debit = self.account(&event.debit)?;
        let credit = self.account(&event.credit)?;
        let kind = recategorise(event.kind, &debit, &credit);
        log::debug!(
            "{} {} {} -> {} amount {}",
            event.date,
            kind,
            event.debit,
            event.credit,
            event.amount
        );

        if let Some(tax) = event.tax_credit {
            if !tax.is_zero() {
                self.tax_paid += tax;
                self.ledger
                    .get_or_create(
                        BucketKind::ExternalParty,
                        Subject::Account(TAX_AUTHORITY.to_string()),
                    )
                    .add_expense(tax);
                self.ledger
                    .get_or_create(
                        BucketKind::CategoryTotal,
                        Subject::Category(TransactionKind::TaxPaid),
                    )
                    .add(tax);
            }
        }

        // Double entry on the plain sides; priced sides go through the
        // capital dispatcher below.
        if debit.external {
            self.ledger
                .get_or_create(BucketKind::ExternalParty, Subject::Account(debit.id.clone()))
                .add_income(event.gross_amount());
        } else if !debit.priced {
            self.ledger
                .get_or_create(BucketKind::AccountBalance, Subject::Account(debit.id.clone()))
                .subtract(event.amount);
        }
        if credit.external {
            self.ledger
                .get_or_create(BucketKind::ExternalParty, Subject::Account(credit.id.clone()))
                .add_expense(event.amount);
        } else if !credit.priced {
            // Income into a tax-exempt or unit-trust sub-account belongs to
            // the parent account
            let target = if kind.is_income() && credit.reattributes_income() {
                self.accounts.attribution_target(&credit).id.clone()
            } else {
                credit.id.clone()
            };
            self.ledger
                .get_or_create(BucketKind::AccountBalance, Subject::Account(target))
                .add(event.amount);
        }

        if kind.is_income() {
            self.add_category(kind, event.gross_amount());
            if let Some(category) = tax_category_for(kind) {
                self.add_tax_category(category, event.gross_amount());
            }
        } else if matches!(
            kind,
            TransactionKind::Expense | TransactionKind::AdminCharge | TransactionKind::GiftOut
        ) {
            self.add_category(kind, event.amount);
        }

        if debit.priced || credit.priced {
            self.apply_capital(event, kind, &debit, &credit)?;
        } else if kind == TransactionKind::TaxableGain {
            // Chargeable gain on an unpriced bond account: the whole
            // amount is the gain
            self.pool_chargeable(event, event.amount);
            self.add_category(TransactionKind::TaxableGain, event.amount);
        }

        Ok(())
    }

    fn add_category(&mut self, kind: TransactionKind, amount: Decimal) {
        self.ledger
            .get_or_create(BucketKind::CategoryTotal, Subject::Category(kind))
            .add(amount);
    }

    fn add_tax_category(&mut self, category: TaxCategory, amount: Decimal) {
        self.ledger
            .get_or_create(BucketKind::TaxCategoryTotal, Subject::Tax(category))
            .add(amount);
    }

    fn pool_chargeable(&mut self, event: &Event, gain: Decimal) {
        self.chargeables.push(ChargeableEvent::new(
            gain,
            event.tax_credit.unwrap_or(Decimal::ZERO),
            event.qualifying_years.unwrap_or(1),
        ));
    }

    fn warn_missing_price(&mut self, account: &str, date: NaiveDate) {
        log::warn!("no price for {} at {}", account, date);
        self.warnings.push(Warning::MissingPrice {
            account: account.to_string(),
            date,
        });
    }

    /// Capital event dispatch for the priced side(s) of an event. A kind
    /// with no rule here is a hard error, never silently skipped.
    fn apply_capital(
        &mut self,
        event: &Event,
        kind: TransactionKind,
        debit: &Account,
        credit: &Account,
    ) -> Result<(), ReplayError> {
        let units = event.units.unwrap_or(Decimal::ZERO);
        let thresholds = self.thresholds;
        match kind {
            TransactionKind::StockSplit if debit.priced => {
                let holding = self.holding_mut(&debit.id);
                let mut entry = holding.begin_entry(event.date, Some(kind));
                entry.set(Attr::UnitsDelta, units);
                holding.units += units;
                holding.close_entry(entry);
            }
            TransactionKind::AdminCharge if debit.priced => {
                let holding = self.holding_mut(&debit.id);
                let mut entry = holding.begin_entry(event.date, Some(kind));
                entry.set(Attr::UnitsDelta, -units);
                holding.units -= units;
                holding.close_entry(entry);
            }
            TransactionKind::Dividend
            | TransactionKind::TaxFreeDividend
            | TransactionKind::UnitTrustDividend
                if debit.priced =>
            {
                let reinvested = event.debit == event.credit;
                let gross = event.gross_amount();
                let holding = self.holding_mut(&debit.id);
                let mut entry = holding.begin_entry(event.date, Some(kind));
                entry.set(Attr::Dividends, gross);
                holding.dividends += gross;
                if reinvested {
                    entry.set(Attr::UnitsDelta, units);
                    entry.set(Attr::CostDelta, event.amount);
                    holding.units += units;
                    holding.cost += event.amount;
                    holding.invested += event.amount;
                }
                holding.close_entry(entry);
            }
            TransactionKind::RightsWaived if debit.priced => {
                let price = self.prices.latest(&debit.id, event.date);
                if price.is_none() {
                    self.warn_missing_price(&debit.id, event.date);
                }
                let holding = self.holding_mut(&debit.id);
                let value = price.unwrap_or(Decimal::ZERO) * holding.units;
                let large = thresholds.is_large(event.amount, value);
                let reduction = if large {
                    // Part disposal: cost reduced by the proceeds' share of
                    // proceeds plus residual value
                    (holding.cost * event.amount / (event.amount + value)).round_dp(2)
                } else {
                    // Return of capital, capped at the cost still available
                    event.amount.min(holding.cost)
                };
                let gain = event.amount - reduction;
                let mut entry = holding.begin_entry(event.date, Some(kind));
                entry.set(Attr::CostDelta, -reduction);
                entry.set(Attr::GainsDelta, gain);
                holding.cost -= reduction;
                holding.realized_gains += gain;
                holding.invested -= event.amount;
                holding.close_entry(entry);
            }
            TransactionKind::Demerger if debit.priced && credit.priced => {
                let moved = {
                    let holding = self.holding_mut(&debit.id);
                    let factor = event.dilution.unwrap_or(Decimal::ONE);
                    let retained = (holding.cost * factor).round_dp(2);
                    let moved = holding.cost - retained;
                    let mut entry = holding.begin_entry(event.date, Some(kind));
                    entry.set(Attr::CostDelta, -moved);
                    holding.cost = retained;
                    holding.invested -= moved;
                    holding.close_entry(entry);
                    moved
                };
                let spun_off = self.holding_mut(&credit.id);
                let mut entry = spun_off.begin_entry(event.date, Some(kind));
                entry.set(Attr::CostDelta, moved);
                entry.set(Attr::UnitsDelta, units);
                spun_off.cost += moved;
                spun_off.units += units;
                spun_off.invested += moved;
                spun_off.close_entry(entry);
            }
            TransactionKind::CashTakeover if debit.priced => {
                let price = self.prices.latest(&debit.id, event.date);
                if price.is_none() {
                    self.warn_missing_price(&debit.id, event.date);
                }
                let holding = self.holding_mut(&debit.id);
                let value = price.unwrap_or(Decimal::ZERO) * holding.units;
                let mut entry = holding.begin_entry(event.date, Some(kind));
                if thresholds.is_large(event.amount, value) {
                    // Gain deferred until the matching stock takeover
                    entry.set(Attr::DeferredCash, event.amount);
                    holding.invested -= event.amount;
                    holding.close_entry(entry);
                } else {
                    let reduction = event.amount.min(holding.cost);
                    let gain = event.amount - reduction;
                    entry.set(Attr::CostDelta, -reduction);
                    entry.set(Attr::GainsDelta, gain);
                    holding.cost -= reduction;
                    holding.realized_gains += gain;
                    holding.invested -= event.amount;
                    holding.close_entry(entry);
                }
            }
            TransactionKind::StockTakeover if debit.priced && credit.priced => {
                let price = self.prices.latest(&credit.id, event.date);
                if price.is_none() {
                    self.warn_missing_price(&credit.id, event.date);
                }
                let new_value = price.unwrap_or(Decimal::ZERO) * units;
                let stock_portion = {
                    let holding = self.holding_mut(&debit.id);
                    let pending = holding.history.pending_takeover();
                    let cash = pending.map_or(Decimal::ZERO, |p| p.cash);
                    let consideration = cash + new_value;
                    let cash_portion = if consideration.is_zero() {
                        Decimal::ZERO
                    } else {
                        (holding.cost * cash / consideration).round_dp(2)
                    };
                    let stock_portion = holding.cost - cash_portion;
                    let gain = cash - cash_portion;
                    let old_units = holding.units;
                    let mut entry = holding.begin_entry(event.date, Some(kind));
                    entry.set(Attr::UnitsDelta, -old_units);
                    entry.set(Attr::CostDelta, -holding.cost);
                    entry.set(Attr::GainsDelta, gain);
                    holding.units = Decimal::ZERO;
                    holding.cost = Decimal::ZERO;
                    holding.realized_gains += gain;
                    holding.invested -= stock_portion;
                    holding.close_entry(entry);
                    if let Some(pending) = pending {
                        holding.history.consume_takeover(pending.index);
                    }
                    stock_portion
                };
                let successor = self.holding_mut(&credit.id);
                let mut entry = successor.begin_entry(event.date, Some(kind));
                entry.set(Attr::UnitsDelta, units);
                entry.set(Attr::CostDelta, stock_portion);
                successor.units += units;
                successor.cost += stock_portion;
                successor.invested += stock_portion;
                successor.close_entry(entry);
            }
            TransactionKind::TaxableGain if debit.priced => {
                let gain = {
                    let holding = self.holding_mut(&debit.id);
                    let reduction = match event.units {
                        Some(sold) if !holding.units.is_zero() => {
                            (holding.cost * sold / holding.units).round_dp(2)
                        }
                        _ => event.amount.min(holding.cost),
                    };
                    let gain = event.amount - reduction;
                    let mut entry = holding.begin_entry(event.date, Some(kind));
                    entry.set(Attr::UnitsDelta, -units);
                    entry.set(Attr::CostDelta, -reduction);
                    holding.units -= units;
                    holding.cost -= reduction;
                    holding.invested -= event.amount;
                    holding.close_entry(entry);
                    gain
                };
                self.pool_chargeable(event, gain);
                self.add_category(TransactionKind::TaxableGain, gain);
            }
            _ => {
                // Acquisitions into a holding, then disposals out of one;
                // anything left is an unhandled kind.
                if kind.is_transfer_in_like() && credit.priced {
                    let holding = self.holding_mut(&credit.id);
                    let mut entry = holding.begin_entry(event.date, Some(kind));
                    entry.set(Attr::UnitsDelta, units);
                    entry.set(Attr::CostDelta, event.amount);
                    entry.set(Attr::Invested, event.amount);
                    holding.units += units;
                    holding.cost += event.amount;
                    holding.invested += event.amount;
                    holding.close_entry(entry);
                }
                if kind.is_disposal_like() && debit.priced {
                    let proceeds = event.amount;
                    let holding = self.holding_mut(&debit.id);
                    let reduction = match event.units {
                        Some(sold) if !holding.units.is_zero() => {
                            (holding.cost * sold / holding.units).round_dp(2)
                        }
                        _ => proceeds.min(holding.cost),
                    };
                    let gain = proceeds - reduction;
                    let mut entry = holding.begin_entry(event.date, Some(kind));
                    entry.set(Attr::UnitsDelta, -units);
                    entry.set(Attr::CostDelta, -reduction);
                    entry.set(Attr::GainsDelta, gain);
                    holding.units -= units;
                    holding.cost -= reduction;
                    holding.realized_gains += gain;
                    holding.invested -= proceeds;
                    holding.close_entry(entry);
                } else if !(kind.is_transfer_in_like() && credit.priced) {
                    let account = if debit.priced { &debit.id } else { &credit.id };
                    return Err(ReplayError::UnhandledKind {
                        kind,
                        account: account.clone(),
                        date: event.date,
                    });
                }
            }
        }
        Ok(())
    }

    fn holding_mut(&mut self, account: &str) -> &mut crate::buckets::HoldingTotals {
        self.ledger
            .get_or_create(BucketKind::AssetDetail, Subject::Account(account.to_string()))
            .holding_mut()
    }

    /// End-of-period valuation of every priced holding. Market movement is
    /// split into realized gains (routed to the capital gain or bond gain
    /// categories for flagged accounts) and residual growth or shrink.
    pub fn value_holdings(&mut self, date: NaiveDate) {
        let holdings: Vec<String> = self
            .ledger
            .iter()
            .filter_map(|bucket| match (&bucket.key.kind, &bucket.key.subject) {
                (BucketKind::AssetDetail, Subject::Account(id)) => Some(id.clone()),
                _ => None,
            })
            .collect();

        for id in holdings {
            let Some(account) = self.accounts.get(&id).cloned() else {
                continue;
            };
            let price = self.prices.latest(&id, date);

            let bucket = self
                .ledger
                .get_or_create(BucketKind::AssetDetail, Subject::Account(id.clone()));
            let base_value = bucket.base().value;
            let holding = bucket.holding_mut();

            let value = if holding.units.is_zero() {
                Decimal::ZERO
            } else {
                match price {
                    Some(price) => (holding.units * price).round_dp(2),
                    None => {
                        // Skip rather than pretend the holding is worthless
                        self.warn_missing_price(&id, date);
                        continue;
                    }
                }
            };

            // Previous value: the last valuation this period, else the
            // prior period's closing value
            let previous = holding
                .history
                .events()
                .iter()
                .rev()
                .find(|e| e.kind.is_none())
                .and_then(|e| e.get(Attr::Value))
                .unwrap_or(base_value);

            let movement = value - previous - holding.invested;
            let realized = holding.realized_gains;
            let dividends = holding.dividends;
            let routed = account.capital_gains || account.life_bond;
            let residual = if routed { movement - realized } else { movement };

            holding.gained += realized + dividends;
            let mut entry = holding.begin_entry(date, None);
            if let Some(price) = price {
                entry.set(Attr::Price, price);
            }
            entry.set(Attr::Value, value);
            entry.set(Attr::Invested, holding.invested);
            entry.set(Attr::Dividends, dividends);
            entry.set(Attr::GainsDelta, realized);
            entry.set(Attr::GainedCumulative, holding.gained);
            holding.value = value;
            holding.invested = Decimal::ZERO;
            holding.dividends = Decimal::ZERO;
            holding.realized_gains = Decimal::ZERO;
            holding.close_entry(entry);
            log::debug!(
                "Valued {} at {}: value {} movement {} realized {}",
                id,
                date,
                value,
                movement,
                realized
            );

            if routed && !realized.is_zero() {
                if account.life_bond {
                    self.add_category(TransactionKind::BondGain, realized);
                } else if realized > Decimal::ZERO {
                    self.add_category(TransactionKind::CapitalGain, realized);
                    self.add_tax_category(TaxCategory::CapitalGains, realized);
                } else {
                    self.add_category(TransactionKind::CapitalLoss, realized.abs());
                    self.add_tax_category(TaxCategory::CapitalGains, realized);
                }
            }
            if residual > Decimal::ZERO {
                self.add_category(TransactionKind::MarketGrowth, residual);
            } else if residual < Decimal::ZERO {
                self.add_category(TransactionKind::MarketShrink, residual.abs());
            }
        }
    }
}

/// Income through a tax-exempt or unit-trust sub-account is re-categorised
/// before totalling.
fn recategorise(kind: TransactionKind, debit: &Account, credit: &Account) -> TransactionKind {
    let flagged = if credit.tax_exempt || credit.unit_trust {
        Some(credit)
    } else if debit.tax_exempt || debit.unit_trust {
        Some(debit)
    } else {
        None
    };
    match (kind, flagged) {
        (TransactionKind::Interest, Some(account)) if account.tax_exempt => {
            TransactionKind::TaxFreeInterest
        }
        (TransactionKind::Dividend, Some(account)) if account.tax_exempt => {
            TransactionKind::TaxFreeDividend
        }
        (TransactionKind::Dividend, Some(account)) if account.unit_trust => {
            TransactionKind::UnitTrustDividend
        }
        _ => kind,
    }
}

/// Tax category an income kind accrues to, where taxable
fn tax_category_for(kind: TransactionKind) -> Option<TaxCategory> {
    match kind {
        TransactionKind::Salary
        | TransactionKind::Pension
        | TransactionKind::StateBenefit
        | TransactionKind::BenefitInKind
        | TransactionKind::OtherIncome => Some(TaxCategory::Salary),
        TransactionKind::Rental => Some(TaxCategory::Rental),
        TransactionKind::Interest => Some(TaxCategory::Interest),
        TransactionKind::Dividend | TransactionKind::UnitTrustDividend => {
            Some(TaxCategory::Dividends)
        }
        _ => None,
    }
}
