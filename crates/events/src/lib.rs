//! Retail domain events and their distribution.
//!
//! Events are published only after the store transaction that produced them
//! has committed. The bus is a distribution mechanism, never the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::{EnvelopeError, EventEnvelope};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
