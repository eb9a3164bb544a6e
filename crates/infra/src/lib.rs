//! Infrastructure layer: persistence, the transactional sale path, customer
//! aggregation, reporting and the service facade.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod customer_stats;
pub mod error;
pub mod insights;
pub mod inventory;
pub mod registry;
pub mod reports;
pub mod sale_writer;
pub mod service;
pub mod store;
pub mod workers;

mod integration_tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{RetailConfig, StockPolicy};
pub use customer_stats::{CustomerStatsAggregator, StatsError, StatsOutcome};
pub use error::{SaleWriteError, ServiceError, ServiceResult};
pub use sale_writer::{BusPublisher, SaleFollowUp, SaleSubmission, TransactionalSaleWriter};
pub use service::{CustomerSelector, RecordSaleRequest, RetailService, RetailServiceBuilder};
pub use store::{InMemoryRetailStore, PostgresRetailStore, RetailStore, SaleFilter, StoreError, WriteOp};
pub use workers::{CustomerStatsWorker, WorkerHandle};
