//! Row-level transformation stages: repair → normalize → bucket → assemble.

pub mod assemble;
pub mod bucket;
pub mod normalize;
pub mod repair;

pub use assemble::assemble;
pub use bucket::{bucket, with_bucket};
pub use normalize::{EmployeeNormalizer, FieldValue, NormalizedRecord};
pub use repair::{RepairStrategy, SingleGapLeftShiftRepair};
