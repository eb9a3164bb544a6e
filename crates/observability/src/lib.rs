//! Process-wide logging setup shared by binaries, tests and benches.

pub mod tracing;

pub use crate::tracing::{DEFAULT_FILTER, init, init_for_tests, init_with_default};
