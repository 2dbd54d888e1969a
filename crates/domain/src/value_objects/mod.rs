//! Value Objects - Immutable, identity-less domain primitives

mod adjustment;
mod recovery_decision;
mod run_id;
mod work_item_id;

pub use adjustment::Adjustment;
pub use recovery_decision::RecoveryDecision;
pub use run_id::RunId;
pub use work_item_id::WorkItemId;
