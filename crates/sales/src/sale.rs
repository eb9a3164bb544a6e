use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeline_catalog::ProductId;
use storeline_core::{Aggregate, AggregateRoot, DomainError, Money, domain_id};
use storeline_customers::CustomerId;
use storeline_events::Event;

use crate::line_item::{LineItem, LineItemInput, recompute_total};
use crate::seller::Seller;

domain_id!(
    /// Sale identifier.
    SaleId
);

/// Denormalized customer reference embedded in a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
}

/// Aggregate root: Sale.
///
/// Immutable once recorded; `version` is 0 before and 1 after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    seller: Option<Seller>,
    customer: Option<CustomerRef>,
    lines: Vec<LineItem>,
    total: Money,
    idempotency_key: Option<String>,
    recorded_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Sale {
    /// Create an empty, not-yet-recorded aggregate instance.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            seller: None,
            customer: None,
            lines: Vec::new(),
            total: Money::ZERO,
            idempotency_key: None,
            recorded_at: None,
            version: 0,
        }
    }

    /// Decide and apply a `RecordSale` command on a fresh aggregate.
    pub fn record(cmd: RecordSale) -> Result<(Sale, SaleRecorded), DomainError> {
        let mut sale = Sale::empty(cmd.sale_id);
        let mut events = sale.execute(&SaleCommand::RecordSale(cmd))?;
        match events.pop() {
            Some(SaleEvent::SaleRecorded(recorded)) => Ok((sale, recorded)),
            None => Err(DomainError::invariant("recording a sale emitted no event")),
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn is_recorded(&self) -> bool {
        self.version > 0
    }

    pub fn seller(&self) -> Option<&Seller> {
        self.seller.as_ref()
    }

    pub fn customer(&self) -> Option<&CustomerRef> {
        self.customer.as_ref()
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer.as_ref().map(|c| c.id)
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Business time of the sale. Unset only on an unrecorded aggregate.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Summed quantity per distinct product, in order of first appearance.
    pub fn stock_deductions(&self) -> Vec<(ProductId, i64)> {
        let mut deductions: Vec<(ProductId, i64)> = Vec::new();
        for line in &self.lines {
            match deductions.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
                None => deductions.push((line.product_id, line.quantity)),
            }
        }
        deductions
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// The event this sale was recorded from; `None` before recording.
    pub fn recorded_event(&self) -> Option<SaleRecorded> {
        Some(SaleRecorded {
            sale_id: self.id,
            seller: self.seller.clone()?,
            customer: self.customer.clone(),
            lines: self.lines.clone(),
            total: self.total,
            idempotency_key: self.idempotency_key.clone(),
            occurred_at: self.recorded_at?,
        })
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordSale.
///
/// `claimed_total` is whatever the caller computed; it is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub seller_id: String,
    pub seller_name: Option<String>,
    pub customer: Option<CustomerRef>,
    pub lines: Vec<LineItemInput>,
    #[serde(default)]
    pub claimed_total: Option<Money>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
}

/// Event: SaleRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub seller: Seller,
    pub customer: Option<CustomerRef>,
    pub lines: Vec<LineItem>,
    pub total: Money,
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SaleRecorded {
    pub const EVENT_TYPE: &'static str = "sales.sale.recorded";
}

impl Event for SaleRecorded {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.seller = Some(e.seller.clone());
                self.customer = e.customer.clone();
                self.lines = e.lines.clone();
                self.total = e.total;
                self.idempotency_key = e.idempotency_key.clone();
                self.recorded_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => self.handle_record(cmd),
        }
    }
}

impl Sale {
    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.is_recorded() {
            return Err(DomainError::conflict("sale already recorded"));
        }
        if self.id != cmd.sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one line item"));
        }

        let seller = Seller::new(&cmd.seller_id, cmd.seller_name.as_deref())?;

        let lines = cmd
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| line.validate(i + 1))
            .collect::<Result<Vec<_>, _>>()?;

        // The caller's total is discarded; only line items count.
        let total = recompute_total(&lines)?;

        let idempotency_key = cmd
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
            sale_id: cmd.sale_id,
            seller,
            customer: cmd.customer.clone(),
            lines,
            total,
            idempotency_key,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_command(lines: Vec<LineItemInput>) -> RecordSale {
        RecordSale {
            sale_id: SaleId::generate(),
            seller_id: "S1".to_string(),
            seller_name: Some("Rita".to_string()),
            customer: None,
            lines,
            claimed_total: None,
            idempotency_key: None,
            occurred_at: test_time(),
        }
    }

    #[test]
    fn record_sale_recomputes_total_ignoring_claimed_total() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let mut cmd = test_command(vec![
            LineItemInput::new(a, "A", 2, Money::from_major(10)),
            LineItemInput::new(b, "B", 1, Money::from_major(5)),
        ]);
        cmd.claimed_total = Some(Money::from_cents(1));

        let (sale, recorded) = Sale::record(cmd).unwrap();

        assert_eq!(sale.total(), Money::from_major(25));
        assert_eq!(recorded.total, Money::from_major(25));
        assert_eq!(sale.recorded_event(), Some(recorded));
        assert_eq!(sale.version(), 1);
        assert_eq!(sale.stock_deductions(), vec![(a, 2), (b, 1)]);
    }

    #[test]
    fn record_sale_rejects_empty_lines() {
        let err = Sale::record(test_command(Vec::new())).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn record_sale_rejects_missing_seller_id() {
        let mut cmd = test_command(vec![LineItemInput::new(
            ProductId::generate(),
            "A",
            1,
            Money::from_major(1),
        )]);
        cmd.seller_id = "".to_string();
        assert!(Sale::record(cmd).unwrap_err().is_validation());
    }

    #[test]
    fn recording_twice_is_a_conflict() {
        let cmd = test_command(vec![LineItemInput::new(
            ProductId::generate(),
            "A",
            1,
            Money::from_major(1),
        )]);
        let (sale, _) = Sale::record(cmd.clone()).unwrap();

        let err = sale.handle(&SaleCommand::RecordSale(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn stock_deductions_merge_repeated_products() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let cmd = test_command(vec![
            LineItemInput::new(a, "A", 2, Money::from_major(1)),
            LineItemInput::new(b, "B", 1, Money::from_major(1)),
            LineItemInput::new(a, "A", 3, Money::from_major(1)),
        ]);
        let (sale, _) = Sale::record(cmd).unwrap();

        assert_eq!(sale.stock_deductions(), vec![(a, 5), (b, 1)]);
        assert_eq!(sale.total_quantity(), 6);
    }

    #[test]
    fn blank_idempotency_key_is_dropped() {
        let mut cmd = test_command(vec![LineItemInput::new(
            ProductId::generate(),
            "A",
            1,
            Money::from_major(1),
        )]);
        cmd.idempotency_key = Some("   ".to_string());
        let (sale, _) = Sale::record(cmd).unwrap();
        assert_eq!(sale.idempotency_key(), None);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let cmd = test_command(vec![LineItemInput::new(
            ProductId::generate(),
            "A",
            1,
            Money::from_major(1),
        )]);
        let sale = Sale::empty(cmd.sale_id);

        let first = sale.handle(&SaleCommand::RecordSale(cmd.clone())).unwrap();
        let second = sale.handle(&SaleCommand::RecordSale(cmd)).unwrap();

        assert_eq!(first, second);
        assert!(!sale.is_recorded());
    }

    #[test]
    fn recorded_sale_roundtrips_through_json() {
        let cmd = test_command(vec![LineItemInput::new(
            ProductId::generate(),
            "A",
            3,
            Money::from_cents(199),
        )]);
        let (sale, _) = Sale::record(cmd).unwrap();

        let json = serde_json::to_value(&sale).unwrap();
        let back: Sale = serde_json::from_value(json).unwrap();
        assert_eq!(back, sale);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the persisted total equals Σ quantity × unit price, whatever the caller claims.
        #[test]
        fn total_is_sum_of_line_subtotals(
            lines in proptest::collection::vec((1i64..100, 0u64..100_000), 1..10),
            claimed in proptest::option::of(0u64..1_000_000),
        ) {
            let inputs: Vec<LineItemInput> = lines
                .iter()
                .map(|&(q, p)| LineItemInput::new(ProductId::generate(), "x", q, Money::from_cents(p)))
                .collect();
            let mut cmd = test_command(inputs);
            cmd.claimed_total = claimed.map(Money::from_cents);

            let (sale, _) = Sale::record(cmd).unwrap();
            let expected: u64 = lines.iter().map(|&(q, p)| q as u64 * p).sum();
            prop_assert_eq!(sale.total().cents(), expected);
        }
    }
}
