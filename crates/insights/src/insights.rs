use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeline_catalog::{Product, ProductId};
use storeline_core::Money;
use storeline_sales::Sale;

use crate::preferences::{CategoryStat, Preferences, ProductLookup, ProductStat};
use crate::recommendation::{RECOMMENDATION_LIMIT, recommend};
use crate::segmentation::{FrequencySegment, mean_gap_days};

/// Purchase behavior summarized from sale history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasePatterns {
    pub total_purchases: u64,
    pub total_spent: Money,
    /// Rounded to the cent for display; incentives use the exact totals.
    pub average_ticket: Money,
    pub frequency: FrequencySegment,
    /// Rounded to whole days for display; classification uses the exact mean.
    pub average_days_between_purchases: Option<i64>,
    pub first_purchase: Option<DateTime<Utc>>,
    pub last_purchase: Option<DateTime<Utc>>,
}

impl PurchasePatterns {
    /// `history` must be ascending by sale time.
    pub fn from_history(history: &[Sale]) -> Self {
        let dates: Vec<DateTime<Utc>> = history.iter().map(Sale::recorded_at).collect();
        let mean_gap = mean_gap_days(&dates);
        let total_purchases = history.len() as u64;
        let total_spent: Money = history.iter().map(Sale::total).sum();

        Self {
            total_purchases,
            total_spent,
            average_ticket: total_spent.div_rounded(total_purchases),
            frequency: FrequencySegment::from_mean_gap(mean_gap),
            average_days_between_purchases: mean_gap.map(|d| d.round() as i64),
            first_purchase: dates.first().copied(),
            last_purchase: dates.last().copied(),
        }
    }
}

/// Everything the insights query returns for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInsights {
    pub favorite_products: Vec<ProductStat>,
    pub favorite_categories: Vec<CategoryStat>,
    pub purchase_patterns: PurchasePatterns,
    pub recommendations: Vec<Product>,
}

impl CustomerInsights {
    /// Build insights from a customer's sale history and the current catalog.
    ///
    /// Sales are re-ordered by time, so callers may pass them in any order.
    pub fn build<L>(history: &[Sale], lookup: &L, catalog: &[Product]) -> Self
    where
        L: ProductLookup + ?Sized,
    {
        let mut ordered: Vec<Sale> = history.to_vec();
        ordered.sort_by_key(Sale::recorded_at);

        let preferences = Preferences::analyze(&ordered, lookup);

        let purchased: HashSet<ProductId> = ordered
            .iter()
            .flat_map(|s| s.lines().iter().map(|l| l.product_id))
            .collect();

        let recommendations = recommend(
            &preferences.category_names(),
            &purchased,
            catalog,
            RECOMMENDATION_LIMIT,
        );

        Self {
            favorite_products: preferences.favorite_products,
            favorite_categories: preferences.favorite_categories,
            purchase_patterns: PurchasePatterns::from_history(&ordered),
            recommendations,
        }
    }

    pub fn favorite_category_names(&self) -> Vec<String> {
        self.favorite_categories
            .iter()
            .map(|c| c.category.clone())
            .collect()
    }

    pub fn favorite_product_ids(&self) -> Vec<ProductId> {
        self.favorite_products.iter().map(|p| p.product_id).collect()
    }
}
