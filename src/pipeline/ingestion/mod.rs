//! Record source for the employee pipeline: header validation and CSV reading.

use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::constants::{columns, EXPECTED_SCHEMA};
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::types::RawRow;

/// Column positions of a validated source header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSchema {
    headers: Vec<String>,
    pub birth_date: usize,
    pub first_name: usize,
    pub last_name: usize,
    pub salary: usize,
    pub department: usize,
    pub employee_id: usize,
}

impl SourceSchema {
    /// Validate a header row. Names are trimmed; every required column must
    /// be present, otherwise the run is aborted with a schema error.
    pub fn from_headers<I, S>(headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .collect();

        let find = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EtlError::Schema(format!("Missing column in data: {}", name)))
        };

        Ok(Self {
            birth_date: find(columns::BIRTH_DATE)?,
            first_name: find(columns::FIRST_NAME)?,
            last_name: find(columns::LAST_NAME)?,
            salary: find(columns::SALARY)?,
            department: find(columns::DEPARTMENT)?,
            employee_id: find(columns::EMPLOYEE_ID)?,
            headers,
        })
    }

    /// The canonical layout: BirthDate, FirstName, LastName, Salary, Department, EmployeeID.
    pub fn expected() -> Self {
        Self {
            headers: EXPECTED_SCHEMA.iter().map(|s| s.to_string()).collect(),
            birth_date: 0,
            first_name: 1,
            last_name: 2,
            salary: 3,
            department: 4,
            employee_id: 5,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

/// Read every data row of a CSV stream. Short records and trailing empty
/// fields become missing cells; long records are truncated to the header width.
pub fn read_rows<R: Read>(input: R) -> Result<(SourceSchema, Vec<RawRow>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let schema = SourceSchema::from_headers(reader.headers()?.iter())?;
    let width = schema.len();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() > width {
            warn!(
                row = index,
                fields = record.len(),
                expected = width,
                "record has more fields than the header; extra fields dropped"
            );
        }
        // Empty fields after the last non-empty one count as missing, so a
        // shifted row ending in a trailing comma is still seen as short.
        let filled = (0..width)
            .rev()
            .find(|&i| record.get(i).map_or(false, |v| !v.trim().is_empty()))
            .map_or(0, |i| i + 1);
        let cells = (0..width)
            .map(|i| {
                if i < filled {
                    record.get(i).map(str::to_string)
                } else {
                    None
                }
            })
            .collect();
        rows.push(RawRow::new(index, cells));
    }

    debug!("read {} rows with {} columns", rows.len(), width);
    metrics::ingestion::rows_read(rows.len() as u64);
    Ok((schema, rows))
}

pub fn read_rows_from_path<P: AsRef<Path>>(path: P) -> Result<(SourceSchema, Vec<RawRow>)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let (schema, rows) = read_rows(file)?;
    info!("Data successfully read from {}: {} rows", path.display(), rows.len());
    Ok((schema, rows))
}
