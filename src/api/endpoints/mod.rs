//! API endpoint handlers.

pub mod ping;
pub mod test_types;
