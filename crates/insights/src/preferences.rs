use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use storeline_catalog::{Product, ProductId};
use storeline_core::Money;
use storeline_sales::Sale;

pub const FAVORITE_PRODUCTS_LIMIT: usize = 5;
pub const FAVORITE_CATEGORIES_LIMIT: usize = 3;

/// Catalog lookup used for category attribution.
///
/// `None` means the product is gone; callers skip it.
pub trait ProductLookup {
    fn product_by_id(&self, id: &ProductId) -> Option<Product>;
}

impl<T: ProductLookup + ?Sized> ProductLookup for &T {
    fn product_by_id(&self, id: &ProductId) -> Option<Product> {
        (**self).product_by_id(id)
    }
}

impl ProductLookup for [Product] {
    fn product_by_id(&self, id: &ProductId) -> Option<Product> {
        self.iter().find(|p| p.id == *id).cloned()
    }
}

impl ProductLookup for Vec<Product> {
    fn product_by_id(&self, id: &ProductId) -> Option<Product> {
        self.as_slice().product_by_id(id)
    }
}

impl ProductLookup for HashMap<ProductId, Product> {
    fn product_by_id(&self, id: &ProductId) -> Option<Product> {
        self.get(id).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStat {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
    /// Number of line items referencing the product.
    pub occurrences: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub quantity: i64,
    pub revenue: Money,
    pub occurrences: u64,
}

/// Favorite products and categories, ranked by cumulative revenue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub favorite_products: Vec<ProductStat>,
    pub favorite_categories: Vec<CategoryStat>,
}

impl Preferences {
    /// Aggregate every line item of `history` (ascending by time).
    ///
    /// Ties in revenue keep order of first appearance.
    pub fn analyze<L>(history: &[Sale], lookup: &L) -> Self
    where
        L: ProductLookup + ?Sized,
    {
        let mut products: Vec<ProductStat> = Vec::new();
        let mut product_index: HashMap<ProductId, usize> = HashMap::new();
        let mut categories: Vec<CategoryStat> = Vec::new();
        let mut category_index: HashMap<String, usize> = HashMap::new();
        let mut category_of: HashMap<ProductId, Option<String>> = HashMap::new();

        for sale in history {
            for line in sale.lines() {
                let revenue = line.subtotal().unwrap_or(Money::ZERO);

                let idx = *product_index.entry(line.product_id).or_insert_with(|| {
                    products.push(ProductStat {
                        product_id: line.product_id,
                        name: line.name.clone(),
                        quantity: 0,
                        revenue: Money::ZERO,
                        occurrences: 0,
                    });
                    products.len() - 1
                });
                let stat = &mut products[idx];
                stat.quantity = stat.quantity.saturating_add(line.quantity);
                stat.revenue = stat.revenue.saturating_add(revenue);
                stat.occurrences += 1;

                let category = category_of
                    .entry(line.product_id)
                    .or_insert_with(|| lookup.product_by_id(&line.product_id).map(|p| p.category))
                    .clone();
                let Some(category) = category.filter(|c| !c.is_empty()) else {
                    continue;
                };

                let idx = match category_index.get(&category) {
                    Some(idx) => *idx,
                    None => {
                        categories.push(CategoryStat {
                            category: category.clone(),
                            quantity: 0,
                            revenue: Money::ZERO,
                            occurrences: 0,
                        });
                        category_index.insert(category, categories.len() - 1);
                        categories.len() - 1
                    }
                };
                let stat = &mut categories[idx];
                stat.quantity = stat.quantity.saturating_add(line.quantity);
                stat.revenue = stat.revenue.saturating_add(revenue);
                stat.occurrences += 1;
            }
        }

        // sort_by is stable
        products.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        categories.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        products.truncate(FAVORITE_PRODUCTS_LIMIT);
        categories.truncate(FAVORITE_CATEGORIES_LIMIT);

        Self {
            favorite_products: products,
            favorite_categories: categories,
        }
    }

    pub fn category_names(&self) -> Vec<String> {
        self.favorite_categories
            .iter()
            .map(|c| c.category.clone())
            .collect()
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.favorite_products.iter().map(|p| p.product_id).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{product, sale_at};
    use super::*;
    use chrono::Utc;

    #[test]
    fn ranks_by_revenue_with_ties_in_first_appearance_order() {
        let mug = product("Mug", "Kitchen", 10, 5);
        let beans = product("Beans", "Coffee", 30, 5);
        let filter = product("Filter", "Coffee", 10, 5);
        let catalog = vec![mug.clone(), beans.clone(), filter.clone()];

        let history = vec![
            sale_at(Utc::now(), &[(&mug, 3), (&filter, 3)]),
            sale_at(Utc::now(), &[(&beans, 2)]),
        ];

        let prefs = Preferences::analyze(&history, &catalog);

        let names: Vec<_> = prefs.favorite_products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Beans", "Mug", "Filter"]);

        assert_eq!(prefs.category_names(), vec!["Coffee", "Kitchen"]);
        assert_eq!(prefs.favorite_categories[0].revenue, Money::from_major(90));
        assert_eq!(prefs.favorite_categories[0].occurrences, 2);
    }

    #[test]
    fn missing_products_are_skipped_for_categories() {
        let mug = product("Mug", "Kitchen", 10, 5);
        let ghost = product("Ghost", "Haunted", 50, 5);
        let catalog = vec![mug.clone()];

        let history = vec![sale_at(Utc::now(), &[(&ghost, 1), (&mug, 1)])];
        let prefs = Preferences::analyze(&history, &catalog);

        assert_eq!(prefs.favorite_products.len(), 2);
        assert_eq!(prefs.category_names(), vec!["Kitchen"]);
    }

    #[test]
    fn limits_favorites() {
        let products: Vec<_> = (0..8)
            .map(|i| product(&format!("P{i}"), &format!("C{i}"), 10 + i, 5))
            .collect();
        let lines: Vec<_> = products.iter().map(|p| (p, 1)).collect();
        let history = vec![sale_at(Utc::now(), &lines)];

        let prefs = Preferences::analyze(&history, &products);

        assert_eq!(prefs.favorite_products.len(), FAVORITE_PRODUCTS_LIMIT);
        assert_eq!(prefs.favorite_categories.len(), FAVORITE_CATEGORIES_LIMIT);
        assert_eq!(prefs.favorite_products[0].name, "P7");
    }
}
