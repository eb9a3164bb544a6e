//! Sales domain module.
//!
//! A sale is decided once from caller line items: validated, total recomputed,
//! then frozen. Committing it together with its stock deductions is the job of
//! the infrastructure layer.

pub mod line_item;
pub mod sale;
pub mod seller;

pub use line_item::{LineItem, LineItemInput, recompute_total};
pub use sale::{
    CustomerRef, RecordSale, Sale, SaleCommand, SaleEvent, SaleId, SaleRecorded,
};
pub use seller::{Seller, SellerId, UNKNOWN_SELLER_NAME};
