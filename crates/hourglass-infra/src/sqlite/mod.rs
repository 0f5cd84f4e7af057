//! SQLite storage layer.
//!
//! The [`SessionRepository`](hourglass_core::repository::SessionRepository)
//! implementation, backed by SQLite with WAL mode and split read/write pools.

pub mod pool;
pub mod session;

pub use pool::DatabasePool;
pub use session::SqliteSessionRepository;
