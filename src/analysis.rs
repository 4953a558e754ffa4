use crate::accounts::AccountBook;
use crate::buckets::Ledger;
use crate::config::Thresholds;
use crate::events::Event;
use crate::prices::PriceBook;
use crate::replay::{Analyser, ReplayError, Warning};
use crate::rollup::{self, Summary};
use crate::tax::{TaxComputation, TaxYear, TaxYearParams};
use chrono::NaiveDate;

/// Progress of one analysis pass. Stages only ever advance; re-running an
/// earlier stage is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Raw,
    Valued,
    Totalled,
    Taxed,
}

/// One period's analysis from raw events through valuation and totalling
/// to the tax computation.
pub struct Analysis<'a> {
    accounts: &'a AccountBook,
    analyser: Analyser<'a>,
    period_end: NaiveDate,
    stage: Stage,
    summary: Option<Summary>,
    computation: Option<TaxComputation>,
}

impl<'a> Analysis<'a> {
    pub fn new(
        accounts: &'a AccountBook,
        prices: &'a PriceBook,
        thresholds: Thresholds,
        period_end: NaiveDate,
    ) -> Self {
        Analysis {
            accounts,
            analyser: Analyser::new(accounts, prices, thresholds),
            period_end,
            stage: Stage::Raw,
            summary: None,
            computation: None,
        }
    }

    /// Start the next period from a prior analysis, carrying active
    /// buckets forward as frozen bases.
    pub fn next_period(prior: &Analysis<'a>, prices: &'a PriceBook, period_end: NaiveDate) -> Self {
        let ledger = Ledger::roll_forward(&prior.analyser.ledger);
        Analysis {
            accounts: prior.accounts,
            analyser: Analyser::with_ledger(
                prior.accounts,
                prices,
                prior.thresholds(),
                ledger,
            ),
            period_end,
            stage: Stage::Raw,
            summary: None,
            computation: None,
        }
    }

    pub fn process(&mut self, events: &[Event]) -> Result<(), ReplayError> {
        debug_assert!(self.stage == Stage::Raw, "events replayed before valuation");
        self.analyser.process(events)
    }

    /// Value every priced holding at the period end
    pub fn value(&mut self) {
        if self.stage < Stage::Valued {
            self.analyser.value_holdings(self.period_end);
            self.stage = Stage::Valued;
        }
    }

    /// Roll detail up into summaries, valuing first if needed
    pub fn totals(&mut self) -> &Summary {
        self.value();
        if self.summary.is_none() {
            self.summary = Some(rollup::summarise(&mut self.analyser.ledger, self.accounts));
            self.stage = Stage::Totalled;
        }
        match &self.summary {
            Some(summary) => summary,
            None => unreachable!(),
        }
    }

    /// Run the tax computation for the period, totalling first if needed
    pub fn tax(
        &mut self,
        params: &TaxYearParams,
        year: TaxYear,
        age: Option<i32>,
    ) -> &TaxComputation {
        self.totals();
        if self.computation.is_none() {
            let summary = match &self.summary {
                Some(summary) => summary,
                None => unreachable!(),
            };
            self.computation = Some(TaxComputation::compute(
                params,
                year,
                &summary.tax_totals,
                self.analyser.chargeables.clone(),
                self.analyser.tax_paid,
                age,
            ));
            self.stage = Stage::Taxed;
        }
        match &self.computation {
            Some(computation) => computation,
            None => unreachable!(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn period_end(&self) -> NaiveDate {
        self.period_end
    }

    pub fn ledger(&self) -> &Ledger {
        &self.analyser.ledger
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.analyser.warnings
    }

    fn thresholds(&self) -> Thresholds {
        self.analyser.thresholds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Account;
    use crate::events::TransactionKind;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cash_account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            name: id.to_string(),
            priced: false,
            cash: true,
            debt: false,
            external: false,
            benefit_in_kind: false,
            tax_exempt: false,
            unit_trust: false,
            life_bond: false,
            capital_gains: false,
            parent: None,
        }
    }

    #[test]
    fn stages_advance_monotonically() {
        let mut employer = cash_account("employer");
        employer.external = true;
        employer.cash = false;
        let accounts = AccountBook::new(vec![employer, cash_account("bank")]);
        let prices = PriceBook::default();
        let mut analysis = Analysis::new(
            &accounts,
            &prices,
            Thresholds::default(),
            date("2025-04-05"),
        );

        analysis
            .process(&[Event {
                date: date("2024-06-01"),
                kind: TransactionKind::Salary,
                debit: "employer".to_string(),
                credit: "bank".to_string(),
                amount: dec!(2000),
                units: None,
                tax_credit: None,
                dilution: None,
                qualifying_years: None,
                description: None,
            }])
            .unwrap();
        assert_eq!(analysis.stage(), Stage::Raw);

        analysis.value();
        assert_eq!(analysis.stage(), Stage::Valued);
        // Idempotent
        analysis.value();
        assert_eq!(analysis.stage(), Stage::Valued);

        let income = analysis.totals().income;
        assert_eq!(income, dec!(2000));
        assert_eq!(analysis.stage(), Stage::Totalled);

        let params = TaxYearParams::for_year(TaxYear(2025));
        let computation = analysis.tax(&params, TaxYear(2025), None);
        assert_eq!(computation.total_tax, Decimal::ZERO);
        assert_eq!(analysis.stage(), Stage::Taxed);

        // Taxing forced totals; calling totals again returns the same
        assert_eq!(analysis.totals().income, dec!(2000));
    }
}
