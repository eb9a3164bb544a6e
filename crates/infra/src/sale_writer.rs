//! Transactional sale write.
//!
//! A sale and the stock decrements it implies are committed as one
//! [`RetailStore::commit`]. Everything after the commit (customer stats, event
//! publication) is a best-effort follow-up that can never undo the sale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};

use storeline_core::{AggregateRoot, DomainError, DomainResult, Money};
use storeline_events::{EventBus, EventEnvelope};
use storeline_sales::{
    CustomerRef, LineItemInput, RecordSale, Sale, SaleId, SellerId, recompute_total,
};

use crate::clock::Clock;
use crate::config::StockPolicy;
use crate::error::SaleWriteError;
use crate::inventory::InventoryLedger;
use crate::store::{RetailStore, StoreError, WriteOp};

/// Stream family used when publishing sale events.
pub const SALE_AGGREGATE_TYPE: &str = "sales.sale";

/// A sale as submitted by the point of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSubmission {
    pub lines: Vec<LineItemInput>,
    pub seller_id: String,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    /// Ignored; the total is recomputed from the lines.
    #[serde(default)]
    pub claimed_total: Option<Money>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl SaleSubmission {
    pub fn new(seller_id: impl Into<String>, lines: Vec<LineItemInput>) -> Self {
        Self {
            lines,
            seller_id: seller_id.into(),
            seller_name: None,
            customer: None,
            claimed_total: None,
            idempotency_key: None,
        }
    }

    pub fn with_seller_name(mut self, name: impl Into<String>) -> Self {
        self.seller_name = Some(name.into());
        self
    }

    pub fn with_customer(mut self, customer: CustomerRef) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn with_claimed_total(mut self, total: Money) -> Self {
        self.claimed_total = Some(total);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Check lines and seller without touching the store. Returns the
    /// authoritative total.
    pub fn validate(&self) -> DomainResult<Money> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one line item"));
        }
        SellerId::parse(&self.seller_id)?;
        let lines = self
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| line.validate(i + 1))
            .collect::<DomainResult<Vec<_>>>()?;
        recompute_total(&lines)
    }

    fn normalized_key(&self) -> Option<&str> {
        self.idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Post-commit step for a sale that references a customer.
///
/// Implementations log their own failures; the sale is already durable.
pub trait SaleFollowUp: Send + Sync {
    fn after_commit(&self, sale: &Sale);
}

impl SaleFollowUp for () {
    fn after_commit(&self, _sale: &Sale) {}
}

impl<A, B> SaleFollowUp for (A, B)
where
    A: SaleFollowUp,
    B: SaleFollowUp,
{
    fn after_commit(&self, sale: &Sale) {
        self.0.after_commit(sale);
        self.1.after_commit(sale);
    }
}

impl<F> SaleFollowUp for Arc<F>
where
    F: SaleFollowUp + ?Sized,
{
    fn after_commit(&self, sale: &Sale) {
        (**self).after_commit(sale)
    }
}

/// Publishes `sales.sale.recorded` envelopes for the customer stats worker.
#[derive(Debug, Clone)]
pub struct BusPublisher<B> {
    bus: B,
}

impl<B> BusPublisher<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> SaleFollowUp for BusPublisher<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn after_commit(&self, sale: &Sale) {
        let Some(event) = sale.recorded_event() else {
            warn!(sale_id = %sale.id_typed(), "refusing to publish an unrecorded sale");
            return;
        };

        let envelope = match EventEnvelope::from_event(
            sale.id_typed().0,
            SALE_AGGREGATE_TYPE,
            sale.version(),
            &event,
        ) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(sale_id = %sale.id_typed(), error = %err, "failed to wrap sale event");
                return;
            }
        };

        if let Err(err) = self.bus.publish(envelope) {
            warn!(sale_id = %sale.id_typed(), error = %err, "failed to publish sale event");
        }
    }
}

/// Records sales atomically with their stock decrements.
///
/// Holds no locks of its own: concurrent writers rely on the store's
/// multi-key transaction.
#[derive(Debug, Clone)]
pub struct TransactionalSaleWriter<S, C, F> {
    ledger: InventoryLedger<S>,
    clock: C,
    follow_up: F,
}

impl<S, C, F> TransactionalSaleWriter<S, C, F>
where
    S: RetailStore,
    C: Clock,
    F: SaleFollowUp,
{
    pub fn new(store: S, clock: C, follow_up: F) -> Self {
        Self {
            ledger: InventoryLedger::new(store, StockPolicy::default()),
            clock,
            follow_up,
        }
    }

    pub fn with_stock_policy(mut self, policy: StockPolicy) -> Self {
        self.ledger = self.ledger.with_policy(policy);
        self
    }

    pub fn stock_policy(&self) -> StockPolicy {
        self.ledger.policy()
    }

    /// Validate, commit and follow up on one sale.
    ///
    /// A submission whose idempotency key was already recorded returns the
    /// original sale without writing anything or running the follow-up.
    pub fn record(&self, submission: SaleSubmission) -> Result<Sale, SaleWriteError> {
        self.record_with(submission, Vec::new())
    }

    /// Like [`record`](Self::record), with `leading` ops committed in the same
    /// transaction ahead of the sale. They are dropped when the submission is
    /// a duplicate.
    #[instrument(
        skip_all,
        fields(seller_id = %submission.seller_id, line_count = submission.lines.len()),
        err
    )]
    pub fn record_with(
        &self,
        submission: SaleSubmission,
        leading: Vec<WriteOp>,
    ) -> Result<Sale, SaleWriteError> {
        let store = self.ledger.store();

        if let Some(key) = submission.normalized_key() {
            if let Some(existing) = store.sale_by_idempotency_key(key)? {
                info!(sale_id = %existing.id_typed(), key, "duplicate sale submission");
                return Ok(existing);
            }
        }

        let (sale, _) = Sale::record(RecordSale {
            sale_id: SaleId::generate(),
            seller_id: submission.seller_id,
            seller_name: submission.seller_name,
            customer: submission.customer,
            lines: submission.lines,
            claimed_total: submission.claimed_total,
            idempotency_key: submission.idempotency_key,
            occurred_at: self.clock.now(),
        })?;

        if let Some(claimed) = submission.claimed_total {
            if claimed != sale.total() {
                debug!(claimed = %claimed, total = %sale.total(), "caller total discarded");
            }
        }

        let mut ops = leading;
        ops.reserve(1 + sale.lines().len());
        ops.push(WriteOp::InsertSale(sale.clone()));
        ops.extend(self.ledger.sale_deductions(&sale));

        match store.commit(ops) {
            Ok(()) => {}
            Err(StoreError::DuplicateSubmission { key, sale_id }) => {
                // Lost a race against the same submission.
                info!(sale_id = %sale_id, key = %key, "duplicate sale submission");
                return store.sale(sale_id)?.ok_or_else(|| {
                    SaleWriteError::Transaction(StoreError::NotFound(format!("sale {sale_id}")))
                });
            }
            Err(err) => {
                warn!(sale_id = %sale.id_typed(), error = %err, "sale transaction failed");
                return Err(err.into());
            }
        }

        info!(
            sale_id = %sale.id_typed(),
            total = %sale.total(),
            lines = sale.lines().len(),
            "sale recorded"
        );

        if sale.customer().is_some() {
            self.follow_up.after_commit(&sale);
        }

        Ok(sale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryRetailStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use storeline_catalog::{NewProduct, Product, ProductId};
    use storeline_customers::CustomerId;
    use storeline_events::InMemoryEventBus;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<SaleId>>);

    impl SaleFollowUp for Recorder {
        fn after_commit(&self, sale: &Sale) {
            self.0.lock().unwrap().push(sale.id_typed());
        }
    }

    fn add_product(store: &InMemoryRetailStore, name: &str, price: u64, stock: i64) -> Product {
        let product = NewProduct::new(name, "General", Money::from_major(price))
            .with_stock(stock)
            .into_product(ProductId::generate(), 10, Utc::now())
            .unwrap();
        store
            .commit(vec![WriteOp::InsertProduct(product.clone())])
            .unwrap();
        product
    }

    fn customer_ref() -> CustomerRef {
        CustomerRef {
            id: CustomerId::generate(),
            name: "Ana".to_string(),
            phone: "5550101".to_string(),
        }
    }

    fn writer(
        store: Arc<InMemoryRetailStore>,
    ) -> (
        TransactionalSaleWriter<Arc<InMemoryRetailStore>, FixedClock, Arc<Recorder>>,
        Arc<Recorder>,
    ) {
        let recorder = Arc::new(Recorder::default());
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap());
        (
            TransactionalSaleWriter::new(store, clock, recorder.clone()),
            recorder,
        )
    }

    #[test]
    fn validation_failures_write_nothing() {
        let store = Arc::new(InMemoryRetailStore::new());
        let a = add_product(&store, "A", 10, 5);
        let (writer, _) = writer(store.clone());

        let zero_qty = SaleSubmission::new("S1", vec![LineItemInput::new(a.id, "A", 0, a.price)]);
        assert!(matches!(
            writer.record(zero_qty),
            Err(SaleWriteError::Validation(_))
        ));

        let no_seller = SaleSubmission::new(" ", vec![LineItemInput::new(a.id, "A", 1, a.price)]);
        assert!(matches!(
            writer.record(no_seller),
            Err(SaleWriteError::Validation(_))
        ));

        assert!(store.sales(&Default::default()).unwrap().is_empty());
        assert_eq!(store.product(a.id).unwrap().unwrap().stock, 5);
    }

    #[test]
    fn follow_up_runs_only_for_sales_with_a_customer() {
        let store = Arc::new(InMemoryRetailStore::new());
        let a = add_product(&store, "A", 10, 5);
        let (writer, recorder) = writer(store);

        let anonymous = writer
            .record(SaleSubmission::new(
                "S1",
                vec![LineItemInput::new(a.id, "A", 1, a.price)],
            ))
            .unwrap();
        let known = writer
            .record(
                SaleSubmission::new("S1", vec![LineItemInput::new(a.id, "A", 1, a.price)])
                    .with_customer(customer_ref()),
            )
            .unwrap();

        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen, vec![known.id_typed()]);
        assert_ne!(anonymous.id_typed(), known.id_typed());
    }

    #[test]
    fn repeated_product_lines_are_decremented_once_with_the_sum() {
        let store = Arc::new(InMemoryRetailStore::new());
        let a = add_product(&store, "A", 10, 5);
        let (writer, _) = writer(store.clone());

        writer
            .record(SaleSubmission::new(
                "S1",
                vec![
                    LineItemInput::new(a.id, "A", 1, a.price),
                    LineItemInput::new(a.id, "A", 2, a.price),
                ],
            ))
            .unwrap();

        assert_eq!(store.product(a.id).unwrap().unwrap().stock, 2);
    }

    #[test]
    fn unknown_product_fails_the_whole_sale() {
        let store = Arc::new(InMemoryRetailStore::new());
        let a = add_product(&store, "A", 10, 5);
        let (writer, recorder) = writer(store.clone());

        let err = writer
            .record(
                SaleSubmission::new(
                    "S1",
                    vec![
                        LineItemInput::new(a.id, "A", 1, a.price),
                        LineItemInput::new(ProductId::generate(), "Ghost", 1, a.price),
                    ],
                )
                .with_customer(customer_ref()),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            SaleWriteError::Transaction(StoreError::NotFound(_))
        ));
        assert!(store.sales(&Default::default()).unwrap().is_empty());
        assert_eq!(store.product(a.id).unwrap().unwrap().stock, 5);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn blank_idempotency_key_is_ignored() {
        let store = Arc::new(InMemoryRetailStore::new());
        let a = add_product(&store, "A", 10, 5);
        let (writer, _) = writer(store.clone());
        let submission = SaleSubmission::new("S1", vec![LineItemInput::new(a.id, "A", 1, a.price)])
            .with_idempotency_key("   ");

        let first = writer.record(submission.clone()).unwrap();
        let second = writer.record(submission).unwrap();

        assert_ne!(first.id_typed(), second.id_typed());
        assert_eq!(store.product(a.id).unwrap().unwrap().stock, 3);
    }

    #[test]
    fn bus_publisher_emits_the_recorded_event() {
        let store = Arc::new(InMemoryRetailStore::new());
        let a = add_product(&store, "A", 10, 5);
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let clock = FixedClock::new(Utc::now());
        let writer = TransactionalSaleWriter::new(store, clock, BusPublisher::new(bus.clone()));

        let sale = writer
            .record(
                SaleSubmission::new("S1", vec![LineItemInput::new(a.id, "A", 2, a.price)])
                    .with_customer(customer_ref()),
            )
            .unwrap();

        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.event_type(), "sales.sale.recorded");
        assert_eq!(envelope.aggregate_type(), SALE_AGGREGATE_TYPE);
        assert_eq!(envelope.aggregate_id(), sale.id_typed().0);
        let decoded: storeline_sales::SaleRecorded = envelope.decode().unwrap();
        assert_eq!(Some(decoded), sale.recorded_event());
    }
}
