use std::sync::Arc;

use thiserror::Error;

use storeline_catalog::{Product, ProductId};
use storeline_core::ExpectedVersion;
use storeline_customers::{Customer, CustomerId};
use storeline_insights::Promotion;
use storeline_sales::{Sale, SaleId};

use super::filter::SaleFilter;

/// One write inside an atomic [`RetailStore::commit`].
///
/// Ops are applied in order; a failing op discards every op before it.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a recorded sale. A reused idempotency key fails with
    /// [`StoreError::DuplicateSubmission`].
    InsertSale(Sale),

    /// Add `delta` to a product's stock counter (negative for a sale).
    ///
    /// With `allow_negative == false` the op fails with
    /// [`StoreError::InsufficientStock`] if the counter would drop below zero.
    AdjustStock {
        product_id: ProductId,
        delta: i64,
        allow_negative: bool,
    },

    InsertProduct(Product),

    /// Replace a product's descriptive fields. Stock is never touched here.
    UpdateProductDetails {
        product: Product,
        expected_version: u64,
    },

    RemoveProduct { product_id: ProductId },

    /// Insert or replace a customer record guarded by `expected`.
    PutCustomer {
        customer: Customer,
        expected: ExpectedVersion,
    },

    /// Append an immutable promotion-history entry.
    AppendPromotion(Promotion),
}

impl WriteOp {
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::InsertSale(_) => "insert_sale",
            WriteOp::AdjustStock { .. } => "adjust_stock",
            WriteOp::InsertProduct(_) => "insert_product",
            WriteOp::UpdateProductDetails { .. } => "update_product_details",
            WriteOp::RemoveProduct { .. } => "remove_product",
            WriteOp::PutCustomer { .. } => "put_customer",
            WriteOp::AppendPromotion(_) => "append_promotion",
        }
    }
}

/// Retail store operation error.
///
/// These are infrastructure errors: whenever `commit` returns one of them,
/// nothing from the batch is visible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("idempotency key '{key}' already recorded as sale {sale_id}")]
    DuplicateSubmission { key: String, sale_id: SaleId },

    #[error("insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    #[error("record (de)serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Transient failures worth retrying with fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict(_) | StoreError::Timeout(_) | StoreError::Unavailable(_)
        )
    }
}

/// Retail persistence contract.
///
/// `commit` is the only write entry point and must be all-or-nothing across
/// every key it touches (sale row, stock counters, customer records). Reads
/// observe committed state only.
///
/// Listing order is part of the contract:
/// - `products()` and `customers()` are sorted by name,
/// - `sales()` is ascending by sale time,
/// - `promotions_for()` is ascending by generation time.
pub trait RetailStore: Send + Sync {
    fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    fn products(&self) -> Result<Vec<Product>, StoreError>;

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError>;

    fn sale_by_idempotency_key(&self, key: &str) -> Result<Option<Sale>, StoreError>;

    fn sales(&self, filter: &SaleFilter) -> Result<Vec<Sale>, StoreError>;

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    /// `phone` is matched against the normalized (digits only) form.
    fn customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError>;

    fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    fn customers(&self) -> Result<Vec<Customer>, StoreError>;

    fn promotions_for(&self, customer_id: CustomerId) -> Result<Vec<Promotion>, StoreError>;
}

impl<S> RetailStore for Arc<S>
where
    S: RetailStore + ?Sized,
{
    fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        (**self).commit(ops)
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id)
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).products()
    }

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        (**self).sale(id)
    }

    fn sale_by_idempotency_key(&self, key: &str) -> Result<Option<Sale>, StoreError> {
        (**self).sale_by_idempotency_key(key)
    }

    fn sales(&self, filter: &SaleFilter) -> Result<Vec<Sale>, StoreError> {
        (**self).sales(filter)
    }

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).customer(id)
    }

    fn customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError> {
        (**self).customer_by_phone(phone)
    }

    fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        (**self).customer_by_email(email)
    }

    fn customers(&self) -> Result<Vec<Customer>, StoreError> {
        (**self).customers()
    }

    fn promotions_for(&self, customer_id: CustomerId) -> Result<Vec<Promotion>, StoreError> {
        (**self).promotions_for(customer_id)
    }
}
