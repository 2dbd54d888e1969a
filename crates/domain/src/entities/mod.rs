//! Domain entities

mod batch;
mod conversion_request;
mod run_summary;
mod work_item;

pub use batch::{Batch, BatchReport, ItemFailure, plan_batches};
pub use conversion_request::ConversionRequest;
pub use run_summary::RunSummary;
pub use work_item::{WorkItem, WorkStatus};
