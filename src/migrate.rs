//! Table migration from the prod instance to the dev instance.
//!
//! Each listed table is exported from prod to a CSV file under the data
//! directory and then imported into the same schema and table on dev.

use csv::{ReaderBuilder, Writer};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::config::{MigrationConfig, MigrationEntry};
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::pipeline::storage::quote_identifier;

/// A connection to one database instance. Schemas are attached lazily.
pub struct Instance {
    label: &'static str,
    dir: PathBuf,
    read_only: bool,
    conn: Connection,
    attached: HashSet<String>,
}

impl Instance {
    /// Open a writable instance, creating its directory if needed.
    pub fn open(label: &'static str, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Self::connect(label, dir, false)
    }

    /// Open an instance that is only read from. Nothing is created on disk and
    /// schema files are attached with `mode=ro`.
    pub fn open_read_only(label: &'static str, dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(EtlError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} instance directory {} does not exist", label, dir.display()),
            )));
        }
        Self::connect(label, dir, true)
    }

    fn connect(label: &'static str, dir: &Path, read_only: bool) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        info!("{} connection established ({})", label, dir.display());
        Ok(Self {
            label,
            dir: dir.to_path_buf(),
            read_only,
            conn,
            attached: HashSet::new(),
        })
    }

    pub fn schema_path(&self, schema: &str) -> PathBuf {
        self.dir.join(format!("{}.db", schema))
    }

    fn attach(&mut self, schema: &str) -> Result<()> {
        if self.attached.contains(schema) {
            return Ok(());
        }
        let quoted = quote_identifier(schema)?;
        let path = self.schema_path(schema);
        let target = if self.read_only {
            if !path.is_file() {
                return Err(EtlError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("schema file {} does not exist", path.display()),
                )));
            }
            read_only_uri(&path)
        } else {
            path.to_string_lossy().into_owned()
        };
        self.conn
            .execute(&format!("ATTACH DATABASE ?1 AS {}", quoted), [target])?;
        self.attached.insert(schema.to_string());
        Ok(())
    }

    /// Write `schema.table` to `path` as CSV and return the row count.
    pub fn export_to_csv(&mut self, schema: &str, table: &str, path: &Path) -> Result<usize> {
        self.attach(schema)?;
        let source = format!("{}.{}", quote_identifier(schema)?, quote_identifier(table)?);

        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", source))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut writer = Writer::from_path(path)?;
        writer.write_record(&columns)?;

        let mut rows = stmt.query([])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                record.push(value_to_text(row.get_ref(idx)?));
            }
            writer.write_record(&record)?;
            count += 1;
        }
        writer.flush()?;

        info!("Exported {} rows from {} {} to {}", count, self.label, source, path.display());
        Ok(count)
    }

    /// Load the CSV at `path` into `schema.table`, creating the table with
    /// TEXT columns when needed. Rows that hit a constraint are skipped.
    pub fn import_from_csv(&mut self, schema: &str, table: &str, path: &Path) -> Result<usize> {
        self.attach(schema)?;
        let target = format!("{}.{}", quote_identifier(schema)?, quote_identifier(table)?);

        let mut reader = ReaderBuilder::new().from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(quote_column).collect();

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            target,
            headers
                .iter()
                .map(|h| format!("{} TEXT", h))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let insert = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            target,
            headers.join(", "),
            vec!["?"; headers.len()].join(", ")
        );

        let tx = self.conn.transaction()?;
        tx.execute(&create, [])?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&insert)?;
            for record in reader.records() {
                let record = record?;
                inserted += stmt.execute(params_from_iter(record.iter()))?;
            }
        }
        tx.commit()?;

        info!("Imported {} rows into {} {}", inserted, self.label, target);
        Ok(inserted)
    }

    pub fn close(self) {
        match self.conn.close() {
            Ok(()) => info!("{} connection closed", self.label),
            Err((_, e)) => warn!("{} connection did not close cleanly: {}", self.label, e),
        }
    }
}

fn value_to_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

/// SQLite URI for opening `path` without write access.
fn read_only_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut uri = String::with_capacity(raw.len() + 16);
    uri.push_str("file:");
    for c in raw.chars() {
        match c {
            '%' => uri.push_str("%25"),
            '?' => uri.push_str("%3F"),
            '#' => uri.push_str("%23"),
            _ => uri.push(c),
        }
    }
    uri.push_str("?mode=ro");
    uri
}

/// CSV headers may be arbitrary text, so quote rather than validate.
fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub schema: String,
    pub table: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// `schema.table` names moved successfully, in order
    pub migrated: Vec<String>,
    /// The entry that stopped the run, if any
    pub failed: Option<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

fn migrate_table(
    prod: &mut Instance,
    dev: &mut Instance,
    entry: &MigrationEntry,
    data_dir: &Path,
) -> Result<()> {
    let csv_path = data_dir.join(format!("{}_{}.csv", entry.schema, entry.table));
    prod.export_to_csv(&entry.schema, &entry.table, &csv_path)?;
    dev.import_from_csv(&entry.schema, &entry.table, &csv_path)?;
    Ok(())
}

/// Move every configured table from prod to dev, stopping at the first failure.
#[instrument(skip_all, fields(tables = config.tables.len()))]
pub fn migrate(config: &MigrationConfig) -> Result<MigrationReport> {
    fs::create_dir_all(&config.data_dir)?;
    let mut prod = Instance::open_read_only("prod", &config.prod.dir)?;
    let mut dev = match Instance::open("dev", &config.dev.dir) {
        Ok(dev) => dev,
        Err(e) => {
            prod.close();
            return Err(e);
        }
    };

    let mut report = MigrationReport::default();
    for entry in &config.tables {
        match migrate_table(&mut prod, &mut dev, entry, &config.data_dir) {
            Ok(()) => {
                info!("Successfully migrated {}.{}", entry.schema, entry.table);
                metrics::tasks::table_migrated();
                report.migrated.push(format!("{}.{}", entry.schema, entry.table));
            }
            Err(e) => {
                error!("Migration of {}.{} failed: {}", entry.schema, entry.table, e);
                report.failed = Some(MigrationFailure {
                    schema: entry.schema.clone(),
                    table: entry.table.clone(),
                    error: e.to_string(),
                });
                break;
            }
        }
    }

    prod.close();
    dev.close();
    info!("Migration process completed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(ValueRef::Null), "");
        assert_eq!(value_to_text(ValueRef::Integer(42)), "42");
        assert_eq!(value_to_text(ValueRef::Real(1.5)), "1.5");
        assert_eq!(value_to_text(ValueRef::Text(b"abc")), "abc");
    }

    #[test]
    fn test_quote_column_escapes_quotes() {
        assert_eq!(quote_column("First Name"), "\"First Name\"");
        assert_eq!(quote_column("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_export_then_import_between_instances() {
        let dir = tempdir().unwrap();
        let prod_dir = dir.path().join("prod");
        let dev_dir = dir.path().join("dev");
        fs::create_dir_all(&prod_dir).unwrap();

        let seed = Connection::open(prod_dir.join("sales.db")).unwrap();
        seed.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, item TEXT, note TEXT);
             INSERT INTO orders VALUES (1, 'lamp', NULL), (2, 'desk', 'rush');",
        )
        .unwrap();
        drop(seed);

        let csv_path = dir.path().join("sales_orders.csv");
        let mut prod = Instance::open_read_only("prod", &prod_dir).unwrap();
        assert_eq!(prod.export_to_csv("sales", "orders", &csv_path).unwrap(), 2);
        prod.close();

        let content = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content, "id,item,note\n1,lamp,\n2,desk,rush\n");

        let mut dev = Instance::open("dev", &dev_dir).unwrap();
        assert_eq!(dev.import_from_csv("sales", "orders", &csv_path).unwrap(), 2);
        dev.close();

        let check = Connection::open(dev_dir.join("sales.db")).unwrap();
        let item: String = check
            .query_row("SELECT item FROM orders WHERE id = '2'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(item, "desk");
    }

    #[test]
    fn test_read_only_instance_does_not_create_schema_files() {
        let dir = tempdir().unwrap();
        let mut prod = Instance::open_read_only("prod", dir.path()).unwrap();

        let err = prod
            .export_to_csv("ghost", "t", &dir.path().join("ghost_t.csv"))
            .unwrap_err();

        assert!(matches!(err, EtlError::Io(_)));
        assert!(!dir.path().join("ghost.db").exists());
        assert!(!dir.path().join("ghost_t.csv").exists());
        prod.close();

        let missing = dir.path().join("no_such_instance");
        assert!(Instance::open_read_only("prod", &missing).is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn test_read_only_uri_escapes_reserved_characters() {
        assert_eq!(
            read_only_uri(Path::new("/data/a?b#c%d/s.db")),
            "file:/data/a%3Fb%23c%25d/s.db?mode=ro"
        );
    }

    #[test]
    fn test_invalid_schema_name_is_rejected() {
        let dir = tempdir().unwrap();
        let mut prod = Instance::open("prod", dir.path()).unwrap();
        let err = prod
            .export_to_csv("bad name", "t", &dir.path().join("x.csv"))
            .unwrap_err();
        assert!(matches!(err, EtlError::InvalidIdentifier(_)));
    }
}
