//! SQLite connection management.
//!
//! WAL mode with split read/write connection pools. The keyword index is the
//! only consumer.

pub mod pool;
