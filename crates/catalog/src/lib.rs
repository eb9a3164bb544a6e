//! Product catalog domain.
//!
//! Deterministic catalog rules only (no IO, no storage). Stock counters live on
//! the product record but are mutated exclusively through store transactions.

pub mod product;

pub use product::{
    DEFAULT_LOW_STOCK_THRESHOLD, NewProduct, Product, ProductId, ProductPatch, StockStatus,
};
