//! Rolling customer purchase aggregate, updated after a sale commits.
//!
//! The write is a compare-and-swap on the customer's version, retried with a
//! fresh read when another writer got there first. Failures never reach the
//! sale path: the sale is already durable.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use storeline_core::{ExpectedVersion, Money};
use storeline_customers::CustomerId;
use storeline_events::{EnvelopeError, EventEnvelope};
use storeline_sales::{Sale, SaleRecorded};

use crate::sale_writer::SaleFollowUp;
use crate::store::{RetailStore, StoreError, WriteOp};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("failed to decode sale event: {0}")]
    Decode(#[from] EnvelopeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one aggregate update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOutcome {
    Applied { customer_id: CustomerId, attempts: u32 },
    /// The referenced customer does not exist; nothing was written.
    MissingCustomer(CustomerId),
    /// Anonymous sale or unrelated event.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct CustomerStatsAggregator<S> {
    store: S,
    max_attempts: u32,
}

impl<S: RetailStore> CustomerStatsAggregator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn apply(&self, sale: &Sale) -> Result<StatsOutcome, StoreError> {
        match sale.customer_id() {
            Some(customer_id) => self.record_purchase(customer_id, sale.total(), sale.recorded_at()),
            None => Ok(StatsOutcome::Skipped),
        }
    }

    /// Apply a `sales.sale.recorded` envelope; other event types are skipped.
    pub fn handle_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<StatsOutcome, StatsError> {
        if envelope.event_type() != SaleRecorded::EVENT_TYPE {
            return Ok(StatsOutcome::Skipped);
        }

        let event: SaleRecorded = envelope.decode()?;
        match &event.customer {
            Some(customer) => Ok(self.record_purchase(customer.id, event.total, event.occurred_at)?),
            None => Ok(StatsOutcome::Skipped),
        }
    }

    /// Fold one purchase into the customer's aggregate.
    pub fn record_purchase(
        &self,
        customer_id: CustomerId,
        total: Money,
        at: DateTime<Utc>,
    ) -> Result<StatsOutcome, StoreError> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let Some(mut customer) = self.store.customer(customer_id)? else {
                warn!(customer_id = %customer_id, "customer not found, skipping stats update");
                return Ok(StatsOutcome::MissingCustomer(customer_id));
            };

            let expected = ExpectedVersion::Exact(customer.version);
            customer.record_purchase(total, at);
            let purchases = customer.aggregate.total_purchases;

            match self.store.commit(vec![WriteOp::PutCustomer { customer, expected }]) {
                Ok(()) => {
                    info!(customer_id = %customer_id, purchases, attempts, "customer stats updated");
                    return Ok(StatsOutcome::Applied {
                        customer_id,
                        attempts,
                    });
                }
                Err(StoreError::Conflict(reason)) if attempts < self.max_attempts => {
                    debug!(customer_id = %customer_id, attempts, reason = %reason, "stats update raced, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<S: RetailStore> SaleFollowUp for CustomerStatsAggregator<S> {
    fn after_commit(&self, sale: &Sale) {
        if let Err(err) = self.apply(sale) {
            warn!(sale_id = %sale.id_typed(), error = %err, "customer stats update failed");
        }
    }
}
