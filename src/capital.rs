use crate::events::TransactionKind;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Fixed attribute vocabulary of a capital event. Initial/Delta/Final
/// triples capture the before/after state of a holding at one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attr {
    UnitsInitial,
    UnitsDelta,
    UnitsFinal,
    CostInitial,
    CostDelta,
    CostFinal,
    GainsInitial,
    GainsDelta,
    GainsFinal,
    Invested,
    Dividends,
    Price,
    Value,
    GainedCumulative,
    /// Cash consideration parked by a large cash takeover, awaiting the
    /// matching stock takeover
    DeferredCash,
    /// Set once a stock takeover has consumed the deferred cash
    DeferredResolved,
}

/// One audit-trail entry for a priced holding: a transaction touching the
/// holding, or an end-of-period valuation (`kind == None`).
#[derive(Debug, Clone)]
pub struct CapitalEvent {
    pub date: NaiveDate,
    pub kind: Option<TransactionKind>,
    attrs: BTreeMap<Attr, Decimal>,
}

impl CapitalEvent {
    pub fn new(date: NaiveDate, kind: Option<TransactionKind>) -> Self {
        CapitalEvent {
            date,
            kind,
            attrs: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, attr: Attr, value: Decimal) {
        self.attrs.insert(attr, value);
    }

    pub fn get(&self, attr: Attr) -> Option<Decimal> {
        self.attrs.get(&attr).copied()
    }

    pub fn attrs(&self) -> impl Iterator<Item = (Attr, Decimal)> + '_ {
        self.attrs.iter().map(|(a, v)| (*a, *v))
    }
}

/// An unresolved cash takeover waiting for its stock takeover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTakeover {
    pub index: usize,
    pub cash: Decimal,
}

/// Append-only, date-ordered audit trail of capital events for one holding
#[derive(Debug, Clone, Default)]
pub struct CapitalLedger {
    events: Vec<CapitalEvent>,
}

impl CapitalLedger {
    pub fn push(&mut self, event: CapitalEvent) {
        debug_assert!(
            self.events.last().map_or(true, |last| last.date <= event.date),
            "capital events must be appended in date order"
        );
        self.events.push(event);
    }

    pub fn events(&self) -> &[CapitalEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all entries after the cut-off date (save-point restore)
    pub fn purge_after(&mut self, cutoff: NaiveDate) {
        self.events.retain(|e| e.date <= cutoff);
    }

    /// Truncate to a recorded length (save-point restore within one date)
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Phase 2 lookup of the deferred takeover protocol: the most recent
    /// cash takeover whose consideration has not yet been consumed.
    pub fn pending_takeover(&self) -> Option<PendingTakeover> {
        self.events
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, event)| match event.get(Attr::DeferredCash) {
                Some(cash) if event.get(Attr::DeferredResolved).is_none() => {
                    Some(PendingTakeover { index, cash })
                }
                _ => None,
            })
    }

    /// Mark a pending takeover as consumed
    pub fn consume_takeover(&mut self, index: usize) {
        if let Some(event) = self.events.get_mut(index) {
            event.set(Attr::DeferredResolved, Decimal::ONE);
        }
    }
}
