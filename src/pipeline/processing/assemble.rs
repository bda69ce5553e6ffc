use super::normalize::NormalizedRecord;
use crate::constants::columns;
use crate::error::{EtlError, Result};
use crate::types::OutputRecord;

/// Project a normalized record onto the destination columns. Intermediate
/// fields (the two name parts, birth date) are dropped.
pub fn assemble(record: &NormalizedRecord) -> Result<OutputRecord> {
    let text = |column: &'static str| {
        record
            .text(column)
            .map(str::to_string)
            .ok_or_else(|| missing(record.index, column))
    };
    let int = |column: &'static str| record.int(column).ok_or_else(|| missing(record.index, column));

    let first_name = text(columns::FIRST_NAME)?;
    let second_name = text(columns::LAST_NAME)?;
    let full_name = format!("{} {}", first_name, second_name).trim().to_string();

    Ok(OutputRecord {
        employee_id: text(columns::EMPLOYEE_ID)?,
        department: text(columns::DEPARTMENT)?,
        salary: int(columns::SALARY)?,
        full_name,
        age: int(columns::AGE)?,
        salary_bucket: record
            .bucket(columns::SALARY_BUCKET)
            .ok_or_else(|| missing(record.index, columns::SALARY_BUCKET))?,
    })
}

fn missing(row: usize, column: &str) -> EtlError {
    EtlError::Schema(format!("row {} is missing required field {}", row, column))
}
