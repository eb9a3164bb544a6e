//! Customers domain module.
//!
//! Customer records, their rolling purchase aggregate, and registration rules,
//! implemented as deterministic domain logic (no IO, no storage).

pub mod customer;
pub mod purchase_aggregate;
pub mod registration;

pub use customer::{Customer, CustomerId, CustomerStatus, CustomerSuggestion};
pub use purchase_aggregate::PurchaseAggregate;
pub use registration::{CustomerRegistration, normalize_email, normalize_phone};
