use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeline_customers::CustomerId;
use storeline_sales::{Sale, SellerId};

/// Filter for sale history queries.
///
/// All fields are optional and combined with AND. Results are always ordered
/// ascending by sale time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    pub customer_id: Option<CustomerId>,
    pub seller_id: Option<SellerId>,
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl SaleFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Self::default()
        }
    }

    pub fn for_seller(seller_id: SellerId) -> Self {
        Self {
            seller_id: Some(seller_id),
            ..Self::default()
        }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn matches(&self, sale: &Sale) -> bool {
        if let Some(customer_id) = self.customer_id {
            if sale.customer_id() != Some(customer_id) {
                return false;
            }
        }
        if let Some(seller_id) = &self.seller_id {
            if sale.seller().map(|s| &s.id) != Some(seller_id) {
                return false;
            }
        }
        let at = sale.recorded_at();
        if self.since.is_some_and(|since| at < since) {
            return false;
        }
        if self.until.is_some_and(|until| at >= until) {
            return false;
        }
        true
    }
}
