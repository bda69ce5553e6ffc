use serde::{Deserialize, Serialize};
use std::fmt;

/// One record as read from the employee source file.
///
/// `cells` always has one slot per header column. A `None` slot means the
/// record ended before reaching that column; an empty field is `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Zero-based data row index (header excluded)
    pub index: usize,
    pub cells: Vec<Option<String>>,
}

impl RawRow {
    pub fn new(index: usize, cells: Vec<Option<String>>) -> Self {
        Self { index, cells }
    }

    /// Build a row where every cell is present.
    pub fn from_values<I, S>(index: usize, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index,
            cells: values.into_iter().map(|v| Some(v.into())).collect(),
        }
    }

    pub fn present_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// What the repair strategy did to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairKind {
    /// Row was well-formed and returned unchanged
    Intact,
    /// Row was realigned; `ambiguous` when the realignment is a best guess
    Shifted { ambiguous: bool },
}

/// A row aligned to the expected schema, one value per expected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedRow {
    pub index: usize,
    pub cells: Vec<String>,
    pub repair: RepairKind,
}

impl RepairedRow {
    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Discrete salary-range classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SalaryBucket {
    A,
    B,
    C,
}

impl SalaryBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryBucket::A => "A",
            SalaryBucket::B => "B",
            SalaryBucket::C => "C",
        }
    }
}

impl fmt::Display for SalaryBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final record shape persisted to the destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(rename = "EmployeeID")]
    pub employee_id: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Salary")]
    pub salary: i64,
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "SalaryBucket")]
    pub salary_bucket: SalaryBucket,
}

/// A field that could not be parsed and was replaced by its default
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub row: usize,
    pub column: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} column {} value {:?}: {}",
            self.row, self.column, self.value, self.reason
        )
    }
}
