use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeline_catalog::ProductId;
use storeline_core::{Money, ValueObject};

/// Rolling summary of a customer's lifetime purchase behavior.
///
/// Denormalized onto the customer record and refreshed after every committed
/// sale that references the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseAggregate {
    pub total_purchases: u64,
    pub total_spent: Money,
    pub average_ticket: Money,
    pub first_purchase_date: Option<DateTime<Utc>>,
    pub last_purchase_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favorite_categories: Vec<String>,
    #[serde(default)]
    pub favorite_products: Vec<ProductId>,
}

impl ValueObject for PurchaseAggregate {}

impl PurchaseAggregate {
    /// Aggregate after one more purchase of `total` at `at`.
    ///
    /// `first_purchase_date` is only set when previously unset.
    pub fn with_purchase(&self, total: Money, at: DateTime<Utc>) -> Self {
        let total_purchases = self.total_purchases.saturating_add(1);
        let total_spent = self.total_spent.saturating_add(total);

        Self {
            total_purchases,
            total_spent,
            average_ticket: total_spent.div_rounded(total_purchases),
            first_purchase_date: self.first_purchase_date.or(Some(at)),
            last_purchase_date: Some(at),
            favorite_categories: self.favorite_categories.clone(),
            favorite_products: self.favorite_products.clone(),
        }
    }

    pub fn has_purchases(&self) -> bool {
        self.total_purchases > 0
    }

    /// Whole days since the last purchase, `None` if the customer never bought.
    pub fn days_since_last_purchase(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_purchase_date
            .map(|last| (now - last).num_days().max(0))
    }
}
