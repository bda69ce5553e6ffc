//! Metrics for the ETL tasks
//!
//! Counters and histograms are recorded through the `metrics` facade using
//! Prometheus naming conventions. Nothing is exported unless the embedding
//! binary installs a recorder.

use std::fmt;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingestion
    RowsRead,

    // Processing
    RowsRepaired,
    RepairsAmbiguous,
    FieldFallbacks,

    // Loader
    LoadAttempts,
    LoadFailures,
    RowsLoaded,
    LoadDuration,

    // Side tasks
    CustomersCleaned,
    TablesMigrated,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RowsRead => "etl_rows_read_total",
            MetricName::RowsRepaired => "etl_rows_repaired_total",
            MetricName::RepairsAmbiguous => "etl_repairs_ambiguous_total",
            MetricName::FieldFallbacks => "etl_field_fallbacks_total",
            MetricName::LoadAttempts => "etl_load_attempts_total",
            MetricName::LoadFailures => "etl_load_failures_total",
            MetricName::RowsLoaded => "etl_rows_loaded_total",
            MetricName::LoadDuration => "etl_load_duration_seconds",
            MetricName::CustomersCleaned => "etl_customers_cleaned_total",
            MetricName::TablesMigrated => "etl_tables_migrated_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod ingestion {
    use super::MetricName;

    pub fn rows_read(count: u64) {
        ::metrics::counter!(MetricName::RowsRead.as_str()).increment(count);
    }
}

pub mod processing {
    use super::MetricName;

    pub fn row_repaired(ambiguous: bool) {
        ::metrics::counter!(MetricName::RowsRepaired.as_str()).increment(1);
        if ambiguous {
            ::metrics::counter!(MetricName::RepairsAmbiguous.as_str()).increment(1);
        }
    }

    /// Record a field that fell back to its default value
    pub fn field_fallback(column: &'static str) {
        ::metrics::counter!(MetricName::FieldFallbacks.as_str(), "column" => column).increment(1);
    }
}

pub mod loader {
    use super::MetricName;

    pub fn attempt() {
        ::metrics::counter!(MetricName::LoadAttempts.as_str()).increment(1);
    }

    pub fn failure(kind: &'static str) {
        ::metrics::counter!(MetricName::LoadFailures.as_str(), "kind" => kind).increment(1);
    }

    pub fn rows_loaded(count: u64) {
        ::metrics::counter!(MetricName::RowsLoaded.as_str()).increment(count);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::LoadDuration.as_str()).record(secs);
    }
}

pub mod tasks {
    use super::MetricName;

    pub fn customers_cleaned(count: u64) {
        ::metrics::counter!(MetricName::CustomersCleaned.as_str()).increment(count);
    }

    pub fn table_migrated() {
        ::metrics::counter!(MetricName::TablesMigrated.as_str()).increment(1);
    }
}
