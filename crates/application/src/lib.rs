//! Application layer - Use cases and orchestration
//!
//! Contains the batch conversion use case and the port definitions its
//! adapters implement. Orchestrates domain objects and infrastructure adapters.

pub mod error;
pub mod ports;
pub mod services;

#[cfg(test)]
mod test_support;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
