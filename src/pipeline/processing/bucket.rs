use super::normalize::{FieldValue, NormalizedRecord};
use crate::constants::{columns, BUCKET_B_FLOOR, BUCKET_C_FLOOR};
use crate::types::SalaryBucket;

/// Classify a salary: `< 50000` is A, `[50000, 100000)` is B, the rest C.
/// Total over all integers; negatives land in A.
pub fn bucket(salary: i64) -> SalaryBucket {
    if salary < BUCKET_B_FLOOR {
        SalaryBucket::A
    } else if salary < BUCKET_C_FLOOR {
        SalaryBucket::B
    } else {
        SalaryBucket::C
    }
}

/// Attach the salary bucket to a normalized record. Records without a
/// salary are left untouched.
pub fn with_bucket(mut record: NormalizedRecord) -> NormalizedRecord {
    if let Some(salary) = record.int(columns::SALARY) {
        record.insert(columns::SALARY_BUCKET, FieldValue::Bucket(bucket(salary)));
    }
    record
}
