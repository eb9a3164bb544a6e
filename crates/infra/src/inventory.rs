//! Stock counters, mutated only through store transactions.

use tracing::info;

use storeline_catalog::{Product, ProductId, StockStatus};
use storeline_core::DomainError;
use storeline_sales::Sale;

use crate::config::StockPolicy;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{RetailStore, StoreError, WriteOp};

/// Turns sales and restocks into stock adjustment ops under a [`StockPolicy`].
#[derive(Debug, Clone)]
pub struct InventoryLedger<S> {
    store: S,
    policy: StockPolicy,
}

impl<S: RetailStore> InventoryLedger<S> {
    pub fn new(store: S, policy: StockPolicy) -> Self {
        Self { store, policy }
    }

    pub fn with_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    pub fn stock_of(&self, product_id: ProductId) -> Result<i64, StoreError> {
        self.store
            .product(product_id)?
            .map(|p| p.stock)
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))
    }

    /// One decrement per distinct product, for the sale's summed quantity.
    ///
    /// Ordered by product id so concurrent sales lock counters in the same order.
    pub fn sale_deductions(&self, sale: &Sale) -> Vec<WriteOp> {
        let mut deductions = sale.stock_deductions();
        deductions.sort_by_key(|(product_id, _)| *product_id);
        deductions
            .into_iter()
            .map(|(product_id, quantity)| WriteOp::AdjustStock {
                product_id,
                delta: quantity.saturating_neg(),
                allow_negative: self.policy.allows_negative(),
            })
            .collect()
    }

    /// Add `quantity` units to a product's counter in its own transaction.
    pub fn restock(&self, product_id: ProductId, quantity: i64) -> ServiceResult<Product> {
        if quantity <= 0 {
            return Err(ServiceError::Validation(DomainError::validation(format!(
                "restock quantity must be positive (got {quantity})"
            ))));
        }

        self.store.commit(vec![WriteOp::AdjustStock {
            product_id,
            delta: quantity,
            allow_negative: true,
        }])?;

        let product = self
            .store
            .product(product_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id}")))?;
        info!(product_id = %product_id, quantity, stock = product.stock, "product restocked");
        Ok(product)
    }

    /// Products with `0 < stock <= threshold`, in catalog order.
    pub fn low_stock(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .store
            .products()?
            .into_iter()
            .filter(|p| p.stock_status() == StockStatus::Low)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRetailStore;
    use chrono::Utc;
    use storeline_catalog::NewProduct;
    use storeline_core::Money;
    use storeline_sales::{LineItemInput, RecordSale, SaleId};

    fn seeded(stock: i64) -> (InventoryLedger<InMemoryRetailStore>, ProductId) {
        let store = InMemoryRetailStore::new();
        let product = NewProduct::new("Beans", "Coffee", Money::from_major(30))
            .with_stock(stock)
            .into_product(ProductId::generate(), 5, Utc::now())
            .unwrap();
        let id = product.id;
        store.commit(vec![WriteOp::InsertProduct(product)]).unwrap();
        (InventoryLedger::new(store, StockPolicy::AllowNegative), id)
    }

    #[test]
    fn sale_deductions_follow_product_id_order() {
        let (ledger, _) = seeded(2);
        let ids: Vec<ProductId> = (0..4).map(|_| ProductId::generate()).collect();
        let lines = vec![
            LineItemInput::new(ids[3], "D", 1, Money::from_major(1)),
            LineItemInput::new(ids[1], "B", 2, Money::from_major(1)),
            LineItemInput::new(ids[3], "D", 4, Money::from_major(1)),
            LineItemInput::new(ids[0], "A", 1, Money::from_major(1)),
        ];
        let (sale, _) = Sale::record(RecordSale {
            sale_id: SaleId::generate(),
            seller_id: "S1".to_string(),
            seller_name: None,
            customer: None,
            lines,
            claimed_total: None,
            idempotency_key: None,
            occurred_at: Utc::now(),
        })
        .unwrap();

        let order: Vec<(ProductId, i64)> = ledger
            .sale_deductions(&sale)
            .into_iter()
            .map(|op| match op {
                WriteOp::AdjustStock {
                    product_id, delta, ..
                } => (product_id, delta),
                other => panic!("unexpected op {other:?}"),
            })
            .collect();

        let mut expected = vec![(ids[3], -5), (ids[1], -2), (ids[0], -1)];
        expected.sort_by_key(|(id, _)| *id);
        assert_eq!(order, expected);
    }

    #[test]
    fn restock_adds_to_the_counter() {
        let (ledger, id) = seeded(2);

        let product = ledger.restock(id, 8).unwrap();

        assert_eq!(product.stock, 10);
        assert_eq!(ledger.stock_of(id).unwrap(), 10);
    }

    #[test]
    fn restock_rejects_non_positive_quantities() {
        let (ledger, id) = seeded(2);

        assert!(ledger.restock(id, 0).unwrap_err().is_validation());
        assert!(ledger.restock(id, -4).unwrap_err().is_validation());
        assert_eq!(ledger.stock_of(id).unwrap(), 2);
    }

    #[test]
    fn restock_of_unknown_product_is_not_found() {
        let (ledger, _) = seeded(2);

        let err = ledger.restock(ProductId::generate(), 1).unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn low_stock_lists_only_positive_counters_under_threshold() {
        let (ledger, id) = seeded(3);
        assert_eq!(ledger.low_stock().unwrap().len(), 1);

        ledger
            .store()
            .commit(vec![WriteOp::AdjustStock {
                product_id: id,
                delta: -3,
                allow_negative: true,
            }])
            .unwrap();
        assert!(ledger.low_stock().unwrap().is_empty());
    }
}
