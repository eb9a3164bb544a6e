//! Catalog management: descriptive product data plus restocking.

use tracing::info;

use storeline_catalog::{NewProduct, Product, ProductId, ProductPatch};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::inventory::InventoryLedger;
use crate::store::{RetailStore, WriteOp};

#[derive(Debug, Clone)]
pub struct CatalogService<S, C> {
    ledger: InventoryLedger<S>,
    clock: C,
    default_low_stock_threshold: i64,
}

impl<S: RetailStore, C: Clock> CatalogService<S, C> {
    pub fn new(ledger: InventoryLedger<S>, clock: C, default_low_stock_threshold: i64) -> Self {
        Self {
            ledger,
            clock,
            default_low_stock_threshold,
        }
    }

    pub fn add(&self, new_product: NewProduct) -> ServiceResult<Product> {
        let product = new_product.into_product(
            ProductId::generate(),
            self.default_low_stock_threshold,
            self.clock.now(),
        )?;

        self.ledger
            .store()
            .commit(vec![WriteOp::InsertProduct(product.clone())])?;
        info!(product_id = %product.id, name = %product.name, "product added");
        Ok(product)
    }

    /// Patch descriptive fields. Stock only changes through sales and restocks.
    pub fn update(&self, id: ProductId, patch: &ProductPatch) -> ServiceResult<Product> {
        let mut product = self.product(id)?;
        if patch.is_empty() {
            return Ok(product);
        }

        let expected_version = product.version;
        product.apply_patch(patch, self.clock.now())?;
        self.ledger.store().commit(vec![WriteOp::UpdateProductDetails {
            product: product.clone(),
            expected_version,
        }])?;

        // Re-read: a concurrent sale may have moved stock since our read.
        let product = self.product(id)?;
        info!(product_id = %id, version = product.version, "product updated");
        Ok(product)
    }

    pub fn remove(&self, id: ProductId) -> ServiceResult<()> {
        self.ledger
            .store()
            .commit(vec![WriteOp::RemoveProduct { product_id: id }])?;
        info!(product_id = %id, "product removed");
        Ok(())
    }

    pub fn product(&self, id: ProductId) -> ServiceResult<Product> {
        self.ledger
            .store()
            .product(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))
    }

    /// All products, sorted by name.
    pub fn products(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.ledger.store().products()?)
    }

    pub fn restock(&self, id: ProductId, quantity: i64) -> ServiceResult<Product> {
        self.ledger.restock(id, quantity)
    }

    pub fn low_stock(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.ledger.low_stock()?)
    }
}
