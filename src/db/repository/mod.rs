//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `rusqlite::Connection`; callers own the
//! connection and its lifetime.


pub use diagnostic_test::*;
