use rust_decimal::Decimal;

/// One chargeable event gain (life assurance bond surrender or part
/// surrender) carried to the tax computation with its qualifying years.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeableEvent {
    pub gain: Decimal,
    /// Tax treated as paid at source on the gain
    pub tax_credit: Decimal,
    /// Complete years the bond was held, never less than one
    pub years: u32,
    /// This event's share of the category tax, filled in by apportionment
    pub apportioned_tax: Decimal,
}

impl ChargeableEvent {
    pub fn new(gain: Decimal, tax_credit: Decimal, years: u32) -> Self {
        ChargeableEvent {
            gain,
            tax_credit,
            years: years.max(1),
            apportioned_tax: Decimal::ZERO,
        }
    }

    /// The top-slicing slice: gain spread over the qualifying years
    pub fn slice(&self) -> Decimal {
        self.gain / Decimal::from(self.years)
    }
}

/// All chargeable events of one period, pooled for a single top-slicing
/// computation.
#[derive(Debug, Clone, Default)]
pub struct ChargeablePool {
    events: Vec<ChargeableEvent>,
}

impl ChargeablePool {
    pub fn push(&mut self, event: ChargeableEvent) {
        log::debug!(
            "Chargeable event pooled: gain {} over {} years (slice {})",
            event.gain,
            event.years,
            event.slice()
        );
        self.events.push(event);
    }

    pub fn events(&self) -> &[ChargeableEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_gain(&self) -> Decimal {
        self.events.iter().map(|e| e.gain).sum()
    }

    /// Combined slice across all pooled events
    pub fn total_slice(&self) -> Decimal {
        self.events.iter().map(|e| e.slice()).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.events.iter().map(|e| e.tax_credit).sum()
    }

    /// Split the category tax across the events pro-rata by slice share.
    /// The shares always sum to the full amount apportioned.
    pub fn apportion(&mut self, tax: Decimal) {
        let total_slice = self.total_slice();
        if total_slice.is_zero() {
            return;
        }
        let mut remaining = tax;
        let last = self.events.len().saturating_sub(1);
        for (i, event) in self.events.iter_mut().enumerate() {
            // Residual to the last event so rounding never loses a penny
            event.apportioned_tax = if i == last {
                remaining
            } else {
                (tax * event.slice() / total_slice).round_dp(2)
            };
            remaining -= event.apportioned_tax;
        }
    }
}
