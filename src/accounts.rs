use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;

/// Broad class of an account, derived from its flags; used for summary
/// roll-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountClass {
    Priced,
    Cash,
    Debt,
    External,
}

impl AccountClass {
    pub fn display(&self) -> &'static str {
        match self {
            AccountClass::Priced => "Priced",
            AccountClass::Cash => "Cash",
            AccountClass::Debt => "Debt",
            AccountClass::External => "External",
        }
    }
}

/// Account master data (read-only input). Category flags drive replay
/// dispatch and tax treatment.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Holds units valued by market price
    pub priced: bool,
    /// Cash-like balance (bank, savings)
    pub cash: bool,
    /// Debt-like balance (mortgage, loan)
    pub debt: bool,
    /// External counterparty (employer, shop, tax authority)
    pub external: bool,
    /// Benefit-in-kind source
    pub benefit_in_kind: bool,
    /// Tax-exempt wrapper (ISA-style)
    pub tax_exempt: bool,
    /// Unit trust sub-account
    pub unit_trust: bool,
    /// Life assurance bond (chargeable gains regime)
    pub life_bond: bool,
    /// Disposals are subject to capital gains tax
    pub capital_gains: bool,
    /// Parent account for sub-account attribution
    pub parent: Option<String>,
}

impl Account {
    pub fn class(&self) -> AccountClass {
        if self.external {
            AccountClass::External
        } else if self.priced {
            AccountClass::Priced
        } else if self.debt {
            AccountClass::Debt
        } else {
            AccountClass::Cash
        }
    }

    /// Income from this account is re-categorised as tax-free or
    /// unit-trust income and attributed to the parent.
    pub fn reattributes_income(&self) -> bool {
        (self.tax_exempt || self.unit_trust) && self.parent.is_some()
    }
}

/// CSV record for account master data; absent flags default to false
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priced: Option<bool>,
    #[serde(default)]
    pub cash: Option<bool>,
    #[serde(default)]
    pub debt: Option<bool>,
    #[serde(default)]
    pub external: Option<bool>,
    #[serde(default)]
    pub benefit_in_kind: Option<bool>,
    #[serde(default)]
    pub tax_exempt: Option<bool>,
    #[serde(default)]
    pub unit_trust: Option<bool>,
    #[serde(default)]
    pub life_bond: Option<bool>,
    #[serde(default)]
    pub capital_gains: Option<bool>,
    #[serde(default)]
    pub parent: Option<String>,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Account {
            id: record.id,
            name: record.name,
            priced: record.priced.unwrap_or(false),
            cash: record.cash.unwrap_or(false),
            debt: record.debt.unwrap_or(false),
            external: record.external.unwrap_or(false),
            benefit_in_kind: record.benefit_in_kind.unwrap_or(false),
            tax_exempt: record.tax_exempt.unwrap_or(false),
            unit_trust: record.unit_trust.unwrap_or(false),
            life_bond: record.life_bond.unwrap_or(false),
            capital_gains: record.capital_gains.unwrap_or(false),
            parent: record.parent.filter(|p| !p.is_empty()),
        }
    }
}

/// Lookup table of accounts by id
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    accounts: HashMap<String, Account>,
}

impl AccountBook {
    pub fn new(accounts: Vec<Account>) -> Self {
        let accounts = accounts.into_iter().map(|a| (a.id.clone(), a)).collect();
        AccountBook { accounts }
    }

    pub fn get(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Account the income of `account` should be attributed to: the parent
    /// for tax-exempt/unit-trust sub-accounts, otherwise the account itself.
    pub fn attribution_target<'a>(&'a self, account: &'a Account) -> &'a Account {
        if account.reattributes_income() {
            if let Some(parent) = account.parent.as_deref().and_then(|p| self.get(p)) {
                return parent;
            }
        }
        account
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Read account master data from CSV
    pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let records: Result<Vec<AccountRecord>, _> = rdr.deserialize::<AccountRecord>().collect();
        Ok(AccountBook::new(
            records?.into_iter().map(Into::into).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            name: id.to_string(),
            priced: false,
            cash: false,
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
    fn class_from_flags() {
        let mut a = account("bank");
        a.cash = true;
        assert_eq!(a.class(), AccountClass::Cash);

        let mut s = account("shares");
        s.priced = true;
        assert_eq!(s.class(), AccountClass::Priced);

        let mut e = account("employer");
        e.external = true;
        e.priced = true; // external wins
        assert_eq!(e.class(), AccountClass::External);
    }

    #[test]
    fn attribution_walks_to_parent() {
        let mut isa = account("isa:cash");
        isa.tax_exempt = true;
        isa.parent = Some("savings".to_string());
        let savings = account("savings");

        let book = AccountBook::new(vec![isa, savings]);
        let isa = book.get("isa:cash").unwrap();
        assert_eq!(book.attribution_target(isa).id, "savings");

        let plain = account("bank");
        let book = AccountBook::new(vec![plain]);
        let plain = book.get("bank").unwrap();
        assert_eq!(book.attribution_target(plain).id, "bank");
    }

    #[test]
    fn read_csv_defaults_missing_flags() {
        let csv_data = r#"id,name,priced,capital_gains,parent
shares:acme,Acme Holdings,true,true,
bank,Current Account,,,"#;

        let book = AccountBook::read_csv(csv_data.as_bytes()).unwrap();
        let shares = book.get("shares:acme").unwrap();
        assert!(shares.priced);
        assert!(shares.capital_gains);
        assert!(!shares.life_bond);

        let bank = book.get("bank").unwrap();
        assert!(!bank.priced);
        assert_eq!(bank.class(), AccountClass::Cash);
    }
}
