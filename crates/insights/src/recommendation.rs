use std::collections::HashSet;

use storeline_catalog::{Product, ProductId};

pub const RECOMMENDATION_LIMIT: usize = 5;

/// Catalog products in a favorite category that the customer has never bought
/// and that are in stock, in catalog iteration order.
pub fn recommend(
    favorite_categories: &[String],
    purchased: &HashSet<ProductId>,
    catalog: &[Product],
    limit: usize,
) -> Vec<Product> {
    catalog
        .iter()
        .filter(|p| favorite_categories.iter().any(|c| *c == p.category))
        .filter(|p| !purchased.contains(&p.id))
        .filter(|p| p.is_available())
        .take(limit)
        .cloned()
        .collect()
}
