//! Destination store seam for the employee batch.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryEmployeeSink;
pub use sqlite::SqliteEmployeeSink;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::error::{EtlError, Result};
use crate::types::OutputRecord;

/// Failure of one store interaction, classified for the retry policy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Expected to clear up on retry (busy/locked database, I/O, cannot open)
    #[error("transient store error: {0}")]
    Transient(String),

    /// Logical failure that a retry will not fix (bad SQL, constraint, schema)
    #[error("permanent store error: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Transient(_) => "transient",
            StoreError::Permanent(_) => "permanent",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let transient = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => matches!(
                failure.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::FileLockingProtocolFailed
                    | ErrorCode::OperationInterrupted
                    | ErrorCode::OutOfMemory
            ),
            _ => false,
        };
        if transient {
            StoreError::Transient(err.to_string())
        } else {
            StoreError::Permanent(err.to_string())
        }
    }
}

/// Destination for a batch of output records.
///
/// One `write_batch` call is one load attempt: open the store, ensure the
/// target table exists, insert every record and commit once. Implementations
/// must leave nothing committed when they return an error, and must release
/// the connection before returning.
pub trait EmployeeSink {
    fn write_batch(&self, records: &[OutputRecord]) -> std::result::Result<usize, StoreError>;
}

impl<T: EmployeeSink + ?Sized> EmployeeSink for &T {
    fn write_batch(&self, records: &[OutputRecord]) -> std::result::Result<usize, StoreError> {
        (**self).write_batch(records)
    }
}

impl<T: EmployeeSink + ?Sized> EmployeeSink for Box<T> {
    fn write_batch(&self, records: &[OutputRecord]) -> std::result::Result<usize, StoreError> {
        (**self).write_batch(records)
    }
}

/// Validate a SQL identifier and return it double-quoted.
pub fn quote_identifier(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(format!("\"{}\"", name))
    } else {
        Err(EtlError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("employees").unwrap(), "\"employees\"");
        assert_eq!(quote_identifier("_t1").unwrap(), "\"_t1\"");
        assert!(quote_identifier("").is_err());
        assert!(quote_identifier("1abc").is_err());
        assert!(quote_identifier("a;drop").is_err());
        assert!(quote_identifier("a\"b").is_err());
    }

    #[test]
    fn test_sqlite_errors_are_classified() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(StoreError::from(busy).is_transient());

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed".into()),
        );
        assert!(!StoreError::from(constraint).is_transient());

        let not_a_db = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_NOTADB),
            None,
        );
        assert_eq!(StoreError::from(not_a_db).kind(), "permanent");

        assert_eq!(
            StoreError::from(rusqlite::Error::QueryReturnedNoRows).kind(),
            "permanent"
        );
    }
}
