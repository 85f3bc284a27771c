pub mod test_type;

pub use diagnostic_test::*;
pub use test_type::*;
