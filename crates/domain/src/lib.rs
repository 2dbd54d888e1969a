//! Domain layer for audiobatch
//!
//! Contains the work model of a batch text-to-speech run: work items and
//! their lifecycle, batches, conversion requests and run summaries.
//! This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod natural_order;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use natural_order::natural_cmp;
pub use value_objects::*;
