//! History log adapters.
//!
//! - `InMemoryHistoryLog` - process-local log, also the test double
//! - `PostgresHistoryLog` - durable log backed by sqlx

mod in_memory;
mod postgres;

pub use in_memory::InMemoryHistoryLog;
pub use postgres::PostgresHistoryLog;
