use csv::Writer;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::constants::OUTPUT_COLUMNS;
use crate::error::Result;
use crate::types::OutputRecord;

/// Spill a batch that could not be persisted to a CSV file, so it can be
/// replayed by hand. An existing file is overwritten.
pub fn write_dead_letter<P: AsRef<Path>>(path: P, records: &[OutputRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = Writer::from_path(path)?;
    // serialize only emits the header alongside the first record
    if records.is_empty() {
        writer.write_record(OUTPUT_COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("wrote {} unpersisted rows to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SalaryBucket;
    use tempfile::tempdir;

    #[test]
    fn test_dead_letter_has_output_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spill").join("failed.csv");
        let record = OutputRecord {
            employee_id: "E001".into(),
            department: "Unknown".into(),
            salary: 55_000,
            full_name: "John OBrien".into(),
            age: 33,
            salary_bucket: SalaryBucket::B,
        };

        write_dead_letter(&path, &[record]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("EmployeeID,Department,Salary,FullName,Age,SalaryBucket")
        );
        assert_eq!(lines.next(), Some("E001,Unknown,55000,John OBrien,33,B"));
    }

    #[test]
    fn test_empty_batch_still_gets_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed.csv");

        write_dead_letter(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "EmployeeID,Department,Salary,FullName,Age,SalaryBucket\n");
    }
}
