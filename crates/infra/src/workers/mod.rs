//! Background workers driven by the event bus.

pub mod bus_worker;
pub mod customer_stats_worker;

pub use bus_worker::{BusWorker, WorkerHandle};
pub use customer_stats_worker::CustomerStatsWorker;
