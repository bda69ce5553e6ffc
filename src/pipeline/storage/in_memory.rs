use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{EmployeeSink, StoreError};
use crate::types::OutputRecord;

/// In-memory employee table for dry runs and testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmployeeSink {
    rows: Arc<Mutex<Vec<OutputRecord>>>,
}

impl InMemoryEmployeeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything committed so far
    pub fn rows(&self) -> Vec<OutputRecord> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EmployeeSink for InMemoryEmployeeSink {
    fn write_batch(&self, records: &[OutputRecord]) -> Result<usize, StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Permanent("in-memory table lock poisoned".to_string()))?;
        rows.extend_from_slice(records);

        debug!("stored {} rows in memory ({} total)", records.len(), rows.len());
        Ok(records.len())
    }
}
