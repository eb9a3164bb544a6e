use std::io;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use storeline_events::{EventBus, EventEnvelope};

use crate::customer_stats::CustomerStatsAggregator;
use crate::store::RetailStore;

use super::bus_worker::{BusWorker, WorkerHandle};

pub const CUSTOMER_STATS_WORKER: &str = "customer-stats";

/// Applies `sales.sale.recorded` envelopes to customer aggregates.
///
/// One worker per process gives a single writer for aggregate updates; the
/// aggregator's compare-and-swap still guards against other processes.
#[derive(Debug)]
pub struct CustomerStatsWorker;

impl CustomerStatsWorker {
    pub fn spawn<B, S>(bus: &B, aggregator: Arc<CustomerStatsAggregator<S>>) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
        S: RetailStore + 'static,
    {
        BusWorker::spawn(
            CUSTOMER_STATS_WORKER,
            bus,
            move |envelope: EventEnvelope<JsonValue>| {
                aggregator.handle_envelope(&envelope).map(|_| ())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::sale_writer::{BusPublisher, SaleSubmission, TransactionalSaleWriter};
    use crate::store::{InMemoryRetailStore, WriteOp};
    use chrono::Utc;
    use std::thread;
    use std::time::{Duration, Instant};
    use storeline_catalog::{NewProduct, ProductId};
    use storeline_core::{ExpectedVersion, Money};
    use storeline_customers::{Customer, CustomerId, CustomerRegistration};
    use storeline_events::InMemoryEventBus;
    use storeline_sales::{CustomerRef, LineItemInput};

    #[test]
    fn published_sales_reach_the_customer_aggregate() {
        let store = Arc::new(InMemoryRetailStore::new());
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

        let product = NewProduct::new("Beans", "Coffee", Money::from_major(30))
            .with_stock(10)
            .into_product(ProductId::generate(), 5, Utc::now())
            .unwrap();
        let customer = Customer::register(
            CustomerId::generate(),
            &CustomerRegistration::new("Ana", "555-0101"),
            Utc::now(),
        )
        .unwrap();
        store
            .commit(vec![
                WriteOp::InsertProduct(product.clone()),
                WriteOp::PutCustomer {
                    customer: customer.clone(),
                    expected: ExpectedVersion::Absent,
                },
            ])
            .unwrap();

        let worker = CustomerStatsWorker::spawn(
            &bus,
            Arc::new(CustomerStatsAggregator::new(store.clone())),
        )
        .unwrap();
        let writer = TransactionalSaleWriter::new(
            store.clone(),
            FixedClock::new(Utc::now()),
            BusPublisher::new(bus.clone()),
        );

        writer
            .record(
                SaleSubmission::new("S1", vec![LineItemInput::new(product.id, "Beans", 2, product.price)])
                    .with_customer(CustomerRef {
                        id: customer.id,
                        name: customer.name.clone(),
                        phone: customer.phone.clone(),
                    }),
            )
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut purchases = 0;
        while purchases == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            purchases = store
                .customer(customer.id)
                .unwrap()
                .map(|c| c.aggregate.total_purchases)
                .unwrap_or(0);
        }
        worker.shutdown();

        let stored = store.customer(customer.id).unwrap().unwrap();
        assert_eq!(stored.aggregate.total_purchases, 1);
        assert_eq!(stored.aggregate.total_spent, Money::from_major(60));
    }
}
