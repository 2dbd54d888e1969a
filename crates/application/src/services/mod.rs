//! Application services - Use case implementations

pub mod aggregator;
pub mod catalog;
pub mod conversion;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod validator;

pub use aggregator::{BatchVerdict, ErrorAggregator};
pub use catalog::{CatalogConfig, FileCatalog};
pub use conversion::{ConversionClient, ConversionFailure, ConversionSettings};
pub use pipeline::{ConversionPipeline, PipelineOptions, PipelineOutcome, RunReport};
pub use progress::ProgressReporter;
pub use scheduler::{BatchScheduler, ScheduleOutcome};
pub use validator::ResultValidator;
