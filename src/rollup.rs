use crate::accounts::{AccountBook, AccountClass};
use crate::buckets::{BucketKind, Ledger, Subject, Totals};
use crate::events::TransactionKind;
use crate::tax::TaxCategory;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Roll-up of one account class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassTotal {
    pub class: AccountClass,
    pub total: Decimal,
}

/// Grand totals extracted from the bucket ledger once replay and valuation
/// are complete.
#[derive(Debug, Clone)]
pub struct Summary {
    pub classes: Vec<ClassTotal>,
    /// Money received from external parties
    pub income: Decimal,
    /// Money paid out to external parties
    pub expense: Decimal,
    pub categories: Vec<(TransactionKind, Decimal)>,
    /// Gross taxable money per category, ready for the tax engine
    pub tax_totals: BTreeMap<TaxCategory, Decimal>,
}

impl Summary {
    pub fn profit(&self) -> Decimal {
        self.income - self.expense
    }

    /// Balance-sheet total across the person's own accounts
    pub fn net_worth(&self) -> Decimal {
        self.classes.iter().map(|c| c.total).sum()
    }

    pub fn class_total(&self, class: AccountClass) -> Decimal {
        self.classes
            .iter()
            .find(|c| c.class == class)
            .map_or(Decimal::ZERO, |c| c.total)
    }
}

/// Fold detail buckets into class summaries and grand totals, writing the
/// class roll-up buckets back into the ledger and pruning empty detail.
pub fn summarise(ledger: &mut Ledger, accounts: &AccountBook) -> Summary {
    let mut classes: BTreeMap<&'static str, (AccountClass, Decimal)> = BTreeMap::new();
    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    let mut categories: BTreeMap<&'static str, (TransactionKind, Decimal)> = BTreeMap::new();
    let mut tax_totals: BTreeMap<TaxCategory, Decimal> = BTreeMap::new();

    for bucket in ledger.iter() {
        match (&bucket.key.kind, &bucket.key.subject, &bucket.totals) {
            (BucketKind::AccountBalance, Subject::Account(id), Totals::Amount(amount)) => {
                let class = accounts.get(id).map_or(AccountClass::Cash, |a| a.class());
                classes.entry(class.display()).or_insert((class, Decimal::ZERO)).1 += *amount;
            }
            (BucketKind::AssetDetail, Subject::Account(_), Totals::Holding(holding)) => {
                let class = AccountClass::Priced;
                classes.entry(class.display()).or_insert((class, Decimal::ZERO)).1 +=
                    holding.value;
            }
            (
                BucketKind::ExternalParty,
                _,
                Totals::External {
                    income: bucket_income,
                    expense: bucket_expense,
                },
            ) => {
                income += *bucket_income;
                expense += *bucket_expense;
            }
            (BucketKind::CategoryTotal, Subject::Category(kind), Totals::Amount(amount)) => {
                categories.entry(kind.display()).or_insert((*kind, Decimal::ZERO)).1 += *amount;
            }
            (BucketKind::TaxCategoryTotal, Subject::Tax(category), Totals::Amount(amount)) => {
                *tax_totals.entry(*category).or_insert(Decimal::ZERO) += *amount;
            }
            _ => {}
        }
    }

    for (class, total) in classes.values() {
        ledger
            .get_or_create(BucketKind::ClassSummary, Subject::Class(*class))
            .add(*total);
        log::debug!("Class {} total {}", class.display(), total);
    }

    ledger.prune();

    Summary {
        classes: classes.into_values().map(|(class, total)| ClassTotal { class, total }).collect(),
        income,
        expense,
        categories: categories.into_values().collect(),
        tax_totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Account;
    use rust_decimal_macros::dec;

    fn account(id: &str, external: bool, priced: bool) -> Account {
        Account {
            id: id.to_string(),
            name: id.to_string(),
            priced,
            cash: !external && !priced,
            debt: false,
            external,
            benefit_in_kind: false,
            tax_exempt: false,
            unit_trust: false,
            life_bond: false,
            capital_gains: false,
            parent: None,
        }
    }

    #[test]
    fn totals_roll_up_by_class_and_party() {
        let accounts = AccountBook::new(vec![
            account("bank", false, false),
            account("shares", false, true),
            account("employer", true, false),
        ]);

        let mut ledger = Ledger::new();
        ledger
            .get_or_create(BucketKind::AccountBalance, Subject::Account("bank".into()))
            .add(dec!(1500));
        ledger
            .get_or_create(BucketKind::AssetDetail, Subject::Account("shares".into()))
            .holding_mut()
            .value = dec!(2500);
        {
            let employer = ledger
                .get_or_create(BucketKind::ExternalParty, Subject::Account("employer".into()));
            employer.add_income(dec!(3000));
            employer.add_expense(dec!(400));
        }
        ledger
            .get_or_create(
                BucketKind::TaxCategoryTotal,
                Subject::Tax(TaxCategory::Salary),
            )
            .add(dec!(3000));

        let summary = summarise(&mut ledger, &accounts);

        assert_eq!(summary.class_total(AccountClass::Cash), dec!(1500));
        assert_eq!(summary.class_total(AccountClass::Priced), dec!(2500));
        assert_eq!(summary.net_worth(), dec!(4000));
        assert_eq!(summary.income, dec!(3000));
        assert_eq!(summary.expense, dec!(400));
        assert_eq!(summary.profit(), dec!(2600));
        assert_eq!(summary.tax_totals[&TaxCategory::Salary], dec!(3000));

        // Roll-up buckets written back
        assert!(ledger
            .get(BucketKind::ClassSummary, &Subject::Class(AccountClass::Cash))
            .is_some());
    }
}
