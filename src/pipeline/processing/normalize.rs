use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::constants::{
    columns, BIRTH_DATE_FORMAT, DEFAULT_REFERENCE_YEAR, DEPARTMENT_PLACEHOLDER,
    UNKNOWN_DEPARTMENT,
};
use crate::observability::metrics;
use crate::pipeline::ingestion::SourceSchema;
use crate::types::{FieldIssue, RawRow, RepairedRow, SalaryBucket};

static NON_LATIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z\s]").expect("name filter pattern is valid"));

/// A typed value in a normalized record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Date(NaiveDate),
    Bucket(SalaryBucket),
    Missing,
}

/// Column name → typed value, plus the field fallbacks applied while building it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    pub index: usize,
    pub values: BTreeMap<&'static str, FieldValue>,
    pub warnings: Vec<FieldIssue>,
}

impl NormalizedRecord {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, column: &'static str, value: FieldValue) {
        self.values.insert(column, value);
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        match self.get(column) {
            Some(FieldValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn bucket(&self, column: &str) -> Option<SalaryBucket> {
        match self.get(column) {
            Some(FieldValue::Bucket(b)) => Some(*b),
            _ => None,
        }
    }

    /// Render back to a source row in the canonical column order, so the
    /// record can be fed through normalization again.
    pub fn to_row(&self) -> RawRow {
        let birth_date = self
            .date(columns::BIRTH_DATE)
            .map(|d| d.format(BIRTH_DATE_FORMAT).to_string())
            .unwrap_or_default();
        let text = |column| self.text(column).unwrap_or("").to_string();
        RawRow::from_values(
            self.index,
            [
                birth_date,
                text(columns::FIRST_NAME),
                text(columns::LAST_NAME),
                self.int(columns::SALARY).unwrap_or(0).to_string(),
                text(columns::DEPARTMENT),
                text(columns::EMPLOYEE_ID),
            ],
        )
    }
}

/// Per-column cleaning rules for employee rows
#[derive(Debug, Clone)]
pub struct EmployeeNormalizer {
    schema: SourceSchema,
    reference_year: i32,
}

impl EmployeeNormalizer {
    pub fn new(schema: SourceSchema, reference_year: i32) -> Self {
        Self {
            schema,
            reference_year,
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Build a normalized record from a repaired row. The row is not modified.
    pub fn normalize(&self, row: &RepairedRow) -> NormalizedRecord {
        let mut record = NormalizedRecord::new(row.index);
        let s = &self.schema;

        record.insert(
            columns::FIRST_NAME,
            FieldValue::Text(clean_name(row.cell(s.first_name))),
        );
        record.insert(
            columns::LAST_NAME,
            FieldValue::Text(clean_name(row.cell(s.last_name))),
        );

        let raw_birth = row.cell(s.birth_date);
        let birth_date = match parse_birth_date(raw_birth) {
            Ok(date) => date,
            Err(reason) => {
                record.warnings.push(issue(row.index, columns::BIRTH_DATE, raw_birth, reason));
                None
            }
        };
        let age = match birth_date {
            Some(date) if date.year() <= self.reference_year => {
                i64::from(self.reference_year - date.year())
            }
            Some(date) => {
                record.warnings.push(issue(
                    row.index,
                    columns::AGE,
                    raw_birth,
                    format!("birth year {} is after {}", date.year(), self.reference_year),
                ));
                0
            }
            None => 0,
        };
        record.insert(
            columns::BIRTH_DATE,
            birth_date.map_or(FieldValue::Missing, FieldValue::Date),
        );
        record.insert(columns::AGE, FieldValue::Int(age));

        let raw_salary = row.cell(s.salary);
        let salary = match parse_salary(raw_salary) {
            Ok(v) => v,
            Err(reason) => {
                record.warnings.push(issue(row.index, columns::SALARY, raw_salary, reason));
                0
            }
        };
        record.insert(columns::SALARY, FieldValue::Int(salary));

        record.insert(
            columns::DEPARTMENT,
            FieldValue::Text(clean_department(row.cell(s.department))),
        );
        record.insert(
            columns::EMPLOYEE_ID,
            FieldValue::Text(row.cell(s.employee_id).trim().to_string()),
        );

        for warning in &record.warnings {
            warn!(
                row = warning.row,
                column = warning.column,
                value = %warning.value,
                "field fallback: {}",
                warning.reason
            );
            metrics::processing::field_fallback(warning.column);
        }

        record
    }
}

impl Default for EmployeeNormalizer {
    fn default() -> Self {
        Self::new(SourceSchema::expected(), DEFAULT_REFERENCE_YEAR)
    }
}

/// Drop everything outside the Latin alphabet and whitespace, then trim.
pub fn clean_name(raw: &str) -> String {
    NON_LATIN.replace_all(raw, "").trim().to_string()
}

/// `Ok(None)` for an empty cell, `Err` for text that is not `YYYY-MM-DD`.
fn parse_birth_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, BIRTH_DATE_FORMAT)
        .map(Some)
        .map_err(|e| format!("not a {} date: {}", BIRTH_DATE_FORMAT, e))
}

/// Empty cells quietly default to 0; anything else must be a finite,
/// non-negative number and is truncated toward zero.
fn parse_salary(raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| "not a number".to_string())?;
    if !value.is_finite() {
        return Err("not a finite number".to_string());
    }
    if value < 0.0 {
        return Err("negative salary".to_string());
    }
    Ok(value.trunc() as i64)
}

fn clean_department(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == DEPARTMENT_PLACEHOLDER {
        UNKNOWN_DEPARTMENT.to_string()
    } else {
        trimmed.to_string()
    }
}

fn issue(row: usize, column: &'static str, value: &str, reason: impl Into<String>) -> FieldIssue {
    FieldIssue {
        row,
        column,
        value: value.to_string(),
        reason: reason.into(),
    }
}
