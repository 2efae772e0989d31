#[cfg(any(test, feature = "test-mocks"))]
pub mod memory;
pub mod models;
pub mod ports;

pub use models::*;
pub use ports::*;
