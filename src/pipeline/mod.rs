// Employee ETL pipeline: ingestion → processing → bounded-retry load

pub mod dead_letter;
pub mod ingestion;
pub mod loader;
pub mod processing;
pub mod storage;

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EmployeeEtlConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::{OutputRecord, RawRow, RepairKind};
use ingestion::SourceSchema;
use loader::{BoundedRetryLoader, LoadOutcome, Sleeper};
use processing::{assemble, with_bucket, EmployeeNormalizer, RepairStrategy, SingleGapLeftShiftRepair};
use storage::EmployeeSink;

/// Output of the transform stages for one batch
#[derive(Debug, Clone, Default)]
pub struct TransformedBatch {
    pub records: Vec<OutputRecord>,
    pub rows_repaired: usize,
    pub ambiguous_repairs: usize,
    pub field_fallbacks: usize,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub rows_read: usize,
    pub rows_repaired: usize,
    pub ambiguous_repairs: usize,
    pub field_fallbacks: usize,
    pub outcome: LoadOutcome,
    pub dead_letter: Option<PathBuf>,
}

/// Repair, normalize, bucket and assemble every row. Nothing touches the
/// store here; the whole batch is built before any load attempt.
pub fn transform_rows(
    schema: &SourceSchema,
    rows: &[RawRow],
    strategy: &dyn RepairStrategy,
    reference_year: i32,
) -> Result<TransformedBatch> {
    let normalizer = EmployeeNormalizer::new(schema.clone(), reference_year);
    let expected = schema.len();
    let mut batch = TransformedBatch {
        records: Vec::with_capacity(rows.len()),
        ..Default::default()
    };

    for row in rows {
        let repaired = strategy.repair(row, expected);
        if let RepairKind::Shifted { ambiguous } = repaired.repair {
            batch.rows_repaired += 1;
            if ambiguous {
                batch.ambiguous_repairs += 1;
                warn!(
                    row = row.index,
                    strategy = strategy.name(),
                    present = row.present_count(),
                    expected,
                    "row could not be realigned unambiguously; filled best-effort"
                );
            } else {
                debug!(row = row.index, strategy = strategy.name(), "realigned shifted row");
            }
            metrics::processing::row_repaired(ambiguous);
        }

        let normalized = normalizer.normalize(&repaired);
        batch.field_fallbacks += normalized.warnings.len();
        batch.records.push(assemble(&with_bucket(normalized))?);
    }

    info!(
        rows = batch.records.len(),
        repaired = batch.rows_repaired,
        ambiguous = batch.ambiguous_repairs,
        fallbacks = batch.field_fallbacks,
        "Data successfully transformed"
    );
    Ok(batch)
}

pub struct EmployeePipeline<S, Z> {
    reference_year: i32,
    dead_letter_path: Option<PathBuf>,
    strategy: Option<Box<dyn RepairStrategy>>,
    loader: BoundedRetryLoader<S, Z>,
}

impl<S: EmployeeSink, Z: Sleeper> EmployeePipeline<S, Z> {
    pub fn new(config: &EmployeeEtlConfig, sink: S, sleeper: Z) -> Self {
        Self {
            reference_year: config.reference_year,
            dead_letter_path: config.dead_letter_path.clone(),
            strategy: None,
            loader: BoundedRetryLoader::new(sink, sleeper, config.retry),
        }
    }

    /// Replace the default repair strategy, which is derived from the header.
    pub fn with_repair_strategy(mut self, strategy: Box<dyn RepairStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn loader(&self) -> &BoundedRetryLoader<S, Z> {
        &self.loader
    }

    /// Read the CSV at `path` and run the batch through every stage.
    pub fn run_path<P: AsRef<Path>>(&self, path: P) -> Result<RunReport> {
        let (schema, rows) = ingestion::read_rows_from_path(path)?;
        self.run_rows(&schema, &rows)
    }

    pub fn run_rows(&self, schema: &SourceSchema, rows: &[RawRow]) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("employee_etl", run_id = %run_id);
        let _enter = span.enter();

        let default_strategy;
        let strategy: &dyn RepairStrategy = match &self.strategy {
            Some(custom) => custom.as_ref(),
            None => {
                default_strategy = SingleGapLeftShiftRepair::for_schema(schema);
                &default_strategy
            }
        };

        let batch = transform_rows(schema, rows, strategy, self.reference_year)?;
        let outcome = self.loader.load(&batch.records);

        let dead_letter = match (&outcome, &self.dead_letter_path) {
            (LoadOutcome::Success { .. }, _) | (_, None) => None,
            (_, Some(path)) => match dead_letter::write_dead_letter(path, &batch.records) {
                Ok(()) => Some(path.clone()),
                Err(e) => {
                    error!("failed to write dead letter file {}: {}", path.display(), e);
                    None
                }
            },
        };

        Ok(RunReport {
            run_id,
            rows_read: rows.len(),
            rows_repaired: batch.rows_repaired,
            ambiguous_repairs: batch.ambiguous_repairs,
            field_fallbacks: batch.field_fallbacks,
            outcome,
            dead_letter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SalaryBucket;

    #[test]
    fn test_transform_end_to_end_row() {
        let schema = SourceSchema::expected();
        let rows = vec![RawRow::from_values(
            0,
            ["1990-05-15", "John O'Brien", "", "55000", "-", "E001"],
        )];

        let batch = transform_rows(&schema, &rows, &SingleGapLeftShiftRepair::default(), 2023).unwrap();

        assert_eq!(
            batch.records,
            vec![OutputRecord {
                employee_id: "E001".into(),
                department: "Unknown".into(),
                salary: 55_000,
                full_name: "John OBrien".into(),
                age: 33,
                salary_bucket: SalaryBucket::B,
            }]
        );
        assert_eq!(batch.rows_repaired, 0);
    }

    #[test]
    fn test_transform_shifted_row_without_second_name() {
        let schema = SourceSchema::expected();
        let rows = vec![RawRow::new(
            0,
            vec![
                Some("1980-03-02".into()),
                Some("Prince".into()),
                Some("90000".into()),
                Some("Music".into()),
                Some("E010".into()),
                None,
            ],
        )];

        let batch = transform_rows(&schema, &rows, &SingleGapLeftShiftRepair::default(), 2023).unwrap();
        let record = &batch.records[0];

        assert_eq!(record.full_name, "Prince");
        assert_eq!(record.salary, 90_000);
        assert_eq!(record.department, "Music");
        assert_eq!(record.employee_id, "E010");
        assert_eq!(batch.rows_repaired, 1);
        assert_eq!(batch.ambiguous_repairs, 1);
    }
}
