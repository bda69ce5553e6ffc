use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{quote_identifier, EmployeeSink, StoreError};
use crate::error::Result;
use crate::types::OutputRecord;

/// Employee table in a SQLite database file. Every batch write opens its own
/// connection and drops it before returning.
#[derive(Debug, Clone)]
pub struct SqliteEmployeeSink {
    path: PathBuf,
    table: String,
    quoted_table: String,
}

impl SqliteEmployeeSink {
    pub fn new<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            table: table.to_string(),
            quoted_table: quote_identifier(table)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                FullName     TEXT,
                Age          INTEGER,
                Salary       NUMERIC,
                SalaryBucket TEXT
            );
            CREATE INDEX IF NOT EXISTS "idx_{name}_FullName" ON {t} (FullName);
            CREATE INDEX IF NOT EXISTS "idx_{name}_SalaryBucket" ON {t} (SalaryBucket);
            "#,
            t = self.quoted_table,
            name = self.table,
        )
    }
}

impl EmployeeSink for SqliteEmployeeSink {
    fn write_batch(&self, records: &[OutputRecord]) -> std::result::Result<usize, StoreError> {
        let mut conn = Connection::open(&self.path)?;
        conn.execute_batch(&self.create_table_sql())?;

        // Dropping an uncommitted transaction rolls it back.
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (FullName, Age, Salary, SalaryBucket) VALUES (?1, ?2, ?3, ?4)",
                self.quoted_table
            ))?;
            for record in records {
                stmt.execute(params![
                    record.full_name,
                    record.age,
                    record.salary,
                    record.salary_bucket.as_str()
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            "committed {} rows into {} at {}",
            records.len(),
            self.table,
            self.path.display()
        );
        Ok(records.len())
    }
}
