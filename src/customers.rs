//! Customer data cleaning: phone/email normalization, derived Age and
//! CustomerType columns, and a per-column summary of the cleaned file.

use csv::{ReaderBuilder, StringRecord, Writer};
use serde::Serialize;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, instrument};

use crate::config::CustomerCleanConfig;
use crate::constants::{DEFAULT_EMAIL, DEFAULT_REFERENCE_YEAR, UNKNOWN_PHONE};
use crate::error::{EtlError, Result};
use crate::observability::metrics;

const PHONE: &str = "Phone";
const EMAIL: &str = "Email";
const BIRTH_YEAR: &str = "BirthYear";
const AGE: &str = "Age";
const CUSTOMER_TYPE: &str = "CustomerType";

/// Age band of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CustomerType {
    Young,
    MiddleAged,
    Senior,
    Unknown,
}

impl CustomerType {
    pub fn from_age(age: Option<i64>) -> Self {
        match age {
            None => CustomerType::Unknown,
            Some(a) if a < 30 => CustomerType::Young,
            Some(a) if a <= 50 => CustomerType::MiddleAged,
            Some(_) => CustomerType::Senior,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Young => "Young",
            CustomerType::MiddleAged => "Middle-aged",
            CustomerType::Senior => "Senior",
            CustomerType::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for CustomerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep only digits; nothing left means the phone is unknown.
pub fn clean_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        UNKNOWN_PHONE.to_string()
    } else {
        digits
    }
}

pub fn clean_email(raw: &str, default_email: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        default_email.to_lowercase()
    } else {
        trimmed.to_lowercase()
    }
}

/// Parse a birth year written either as an integer or as a float like `1985.0`.
fn parse_birth_year(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(year) = trimmed.parse::<i64>() {
        return Some(year);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|y| y.is_finite())
        .map(|y| y.trunc() as i64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCount {
    pub column: String,
    pub non_empty: usize,
}

/// Descriptive summary of the cleaned customer file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub rows: usize,
    pub columns: Vec<ColumnCount>,
    pub age_mean: Option<f64>,
    pub age_median: Option<f64>,
    pub age_std: Option<f64>,
}

impl CustomerSummary {
    fn build(headers: &StringRecord, rows: &[StringRecord], ages: &[i64]) -> Self {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| ColumnCount {
                column: name.to_string(),
                non_empty: rows
                    .iter()
                    .filter(|r| r.get(idx).map_or(false, |v| !v.trim().is_empty()))
                    .count(),
            })
            .collect();

        let (age_mean, age_median, age_std) = age_stats(ages);
        Self {
            rows: rows.len(),
            columns,
            age_mean,
            age_median,
            age_std,
        }
    }
}

fn age_stats(ages: &[i64]) -> (Option<f64>, Option<f64>, Option<f64>) {
    if ages.is_empty() {
        return (None, None, None);
    }
    let n = ages.len() as f64;
    let mean = ages.iter().map(|&a| a as f64).sum::<f64>() / n;

    let mut sorted = ages.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    };

    // sample standard deviation, undefined for a single value
    let std = (ages.len() > 1).then(|| {
        let var = ages
            .iter()
            .map(|&a| (a as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        var.sqrt()
    });

    (Some(mean), Some(median), std)
}

pub struct CustomerCleaner {
    reference_year: i32,
    default_email: String,
}

impl Default for CustomerCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_YEAR, DEFAULT_EMAIL)
    }
}

impl CustomerCleaner {
    pub fn new(reference_year: i32, default_email: impl Into<String>) -> Self {
        Self {
            reference_year,
            default_email: default_email.into(),
        }
    }

    pub fn from_config(config: &CustomerCleanConfig) -> Self {
        Self::new(config.reference_year, config.default_email.clone())
    }

    /// Clean the CSV read from `input` and write the result to `output`.
    pub fn clean<R: Read, W: Write>(&self, input: R, output: W) -> Result<CustomerSummary> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);
        let source_headers = reader.headers()?.clone();

        let position = |name: &str| {
            source_headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| EtlError::Schema(format!("Missing column in data: {}", name)))
        };
        let phone_idx = position(PHONE)?;
        let email_idx = position(EMAIL)?;
        let birth_idx = position(BIRTH_YEAR)?;

        // derived columns always land at the end, in this order
        let kept: Vec<usize> = source_headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.trim() != AGE && h.trim() != CUSTOMER_TYPE)
            .map(|(idx, _)| idx)
            .collect();
        let mut headers: StringRecord = kept.iter().map(|&idx| &source_headers[idx]).collect();
        headers.push_field(AGE);
        headers.push_field(CUSTOMER_TYPE);

        let mut rows = Vec::new();
        let mut ages = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            // a year too far out to subtract is treated like an unparseable one
            let age = parse_birth_year(field(birth_idx))
                .and_then(|y| i64::from(self.reference_year).checked_sub(y));
            if let Some(a) = age {
                ages.push(a);
            }

            let mut cleaned = StringRecord::new();
            for &idx in &kept {
                let value = if idx == phone_idx {
                    clean_phone(field(idx))
                } else if idx == email_idx {
                    clean_email(field(idx), &self.default_email)
                } else {
                    field(idx).to_string()
                };
                cleaned.push_field(&value);
            }
            cleaned.push_field(&age.map(|a| a.to_string()).unwrap_or_default());
            cleaned.push_field(CustomerType::from_age(age).as_str());
            rows.push(cleaned);
        }

        let mut writer = Writer::from_writer(output);
        writer.write_record(&headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        metrics::tasks::customers_cleaned(rows.len() as u64);
        Ok(CustomerSummary::build(&headers, &rows, &ages))
    }

    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub fn clean_file(&self, input: &Path, output: &Path) -> Result<CustomerSummary> {
        let reader = fs::File::open(input)?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = fs::File::create(output)?;

        let summary = self.clean(reader, writer)?;
        info!(
            rows = summary.rows,
            age_mean = ?summary.age_mean,
            age_median = ?summary.age_median,
            age_std = ?summary.age_std,
            "Cleaned customer data written to {}",
            output.display()
        );
        for column in &summary.columns {
            info!("{}: {} non-empty", column.column, column.non_empty);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> (String, CustomerSummary) {
        let mut out = Vec::new();
        let summary = CustomerCleaner::default()
            .clean(input.as_bytes(), &mut out)
            .unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone("(555) 123-4567"), "5551234567");
        assert_eq!(clean_phone(""), "Unknown");
        assert_eq!(clean_phone("n/a"), "Unknown");
    }

    #[test]
    fn test_clean_email() {
        assert_eq!(clean_email(" Bob@Example.COM ", DEFAULT_EMAIL), "bob@example.com");
        assert_eq!(clean_email("", DEFAULT_EMAIL), "myuser@example.com");
    }

    #[test]
    fn test_customer_type_boundaries() {
        assert_eq!(CustomerType::from_age(Some(29)), CustomerType::Young);
        assert_eq!(CustomerType::from_age(Some(30)), CustomerType::MiddleAged);
        assert_eq!(CustomerType::from_age(Some(50)), CustomerType::MiddleAged);
        assert_eq!(CustomerType::from_age(Some(51)), CustomerType::Senior);
        assert_eq!(CustomerType::from_age(None), CustomerType::Unknown);
        assert_eq!(CustomerType::MiddleAged.to_string(), "Middle-aged");
    }

    #[test]
    fn test_clean_appends_derived_columns() {
        let (out, summary) = run(
            "Name,Phone,Email,BirthYear\n\
             Ann,555-0100,ANN@X.COM,1990\n\
             Bo,,,1960.0\n\
             Cy,12,c@x.com,\n",
        );

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Name,Phone,Email,BirthYear,Age,CustomerType");
        assert_eq!(lines[1], "Ann,5550100,ann@x.com,1990,33,Middle-aged");
        assert_eq!(lines[2], "Bo,Unknown,myuser@example.com,1960.0,63,Senior");
        assert_eq!(lines[3], "Cy,12,c@x.com,,,Unknown");

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.age_mean, Some(48.0));
        assert_eq!(summary.age_median, Some(48.0));
        let std = summary.age_std.unwrap();
        assert!((std - 21.213203435596427).abs() < 1e-9);

        let birth = summary.columns.iter().find(|c| c.column == "BirthYear").unwrap();
        assert_eq!(birth.non_empty, 2);
        let phone = summary.columns.iter().find(|c| c.column == "Phone").unwrap();
        assert_eq!(phone.non_empty, 3);
    }

    #[test]
    fn test_existing_derived_columns_are_replaced() {
        let (out, _) = run("Age,Phone,Email,BirthYear,CustomerType\n99,1,a@b.c,2000,Old\n");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Phone,Email,BirthYear,Age,CustomerType");
        assert_eq!(lines[1], "1,a@b.c,2000,23,Young");
    }

    #[test]
    fn test_out_of_range_birth_year_is_unknown() {
        let (out, summary) = run(
            "Phone,Email,BirthYear\n\
             1,a@b.c,-9223372036854775808\n\
             2,b@b.c,1990\n",
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "1,a@b.c,-9223372036854775808,,Unknown");
        assert_eq!(lines[2], "2,b@b.c,1990,33,Middle-aged");
        assert_eq!(summary.age_mean, Some(33.0));
    }

    #[test]
    fn test_age_stats_do_not_overflow() {
        let (mean, median, _) = age_stats(&[i64::MAX, i64::MAX]);
        assert!(mean.unwrap() > 9.0e18);
        assert!(median.unwrap() > 9.0e18);
    }

    #[test]
    fn test_missing_required_column() {
        let err = CustomerCleaner::default()
            .clean("Name,Email,BirthYear\nA,a@b.c,1990\n".as_bytes(), Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, EtlError::Schema(ref m) if m.contains("Phone")));
    }
}
