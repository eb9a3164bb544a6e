//! Retail persistence boundary.
//!
//! One trait covers the transactional write path (atomic multi-key `commit`)
//! and the point/filtered reads the services need, with an in-memory backend
//! for tests/dev and a Postgres backend for production.

pub mod filter;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use filter::SaleFilter;
pub use in_memory::InMemoryRetailStore;
pub use postgres::PostgresRetailStore;
pub use r#trait::{RetailStore, StoreError, WriteOp};
