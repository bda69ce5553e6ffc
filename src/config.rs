use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::error::{EtlError, Result};
use crate::pipeline::loader::RetryPolicy;

/// Settings for the employee ETL run. Built once at startup and handed to the
/// driver; nothing below reads the environment itself.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeEtlConfig {
    pub input_path: PathBuf,
    pub database_path: PathBuf,
    pub table: String,
    pub retry: RetryPolicy,
    pub reference_year: i32,
    pub dead_letter_path: Option<PathBuf>,
}

impl Default for EmployeeEtlConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_EMPLOYEE_CSV),
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            table: DEFAULT_TABLE.to_string(),
            retry: RetryPolicy::default(),
            reference_year: DEFAULT_REFERENCE_YEAR,
            dead_letter_path: None,
        }
    }
}

impl EmployeeEtlConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            input_path: lookup("EMPLOYEE_CSV").map(PathBuf::from).unwrap_or(defaults.input_path),
            database_path: lookup("DB_PATH").map(PathBuf::from).unwrap_or(defaults.database_path),
            table: lookup("EMPLOYEE_TABLE").unwrap_or(defaults.table),
            retry: RetryPolicy {
                max_attempts: parse_var(&lookup, "LOAD_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
                delay: Duration::from_secs(parse_var(
                    &lookup,
                    "LOAD_RETRY_DELAY_SECS",
                    DEFAULT_RETRY_DELAY_SECS,
                )?),
                retry_permanent_errors: parse_bool(&lookup, "LOAD_RETRY_PERMANENT", false)?,
            },
            reference_year: parse_var(&lookup, "AGE_REFERENCE_YEAR", DEFAULT_REFERENCE_YEAR)?,
            dead_letter_path: lookup("DEAD_LETTER_CSV")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(EtlError::Config(
                "LOAD_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.table.trim().is_empty() {
            return Err(EtlError::Config("EMPLOYEE_TABLE must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Settings for the customer cleaning task
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerCleanConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub reference_year: i32,
    pub default_email: String,
}

impl Default for CustomerCleanConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_CUSTOMER_CSV),
            output_path: PathBuf::from(DEFAULT_CLEANED_CUSTOMER_CSV),
            reference_year: DEFAULT_REFERENCE_YEAR,
            default_email: DEFAULT_EMAIL.to_string(),
        }
    }
}

impl CustomerCleanConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            input_path: lookup("CUSTOMER_CSV").map(PathBuf::from).unwrap_or(defaults.input_path),
            output_path: lookup("CLEANED_CUSTOMER_CSV")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
            reference_year: parse_var(&lookup, "AGE_REFERENCE_YEAR", DEFAULT_REFERENCE_YEAR)?,
            default_email: lookup("CUSTOMER_DEFAULT_EMAIL").unwrap_or(defaults.default_email),
        })
    }
}

/// A database instance: a directory holding one SQLite file per schema
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigrationEntry {
    pub schema: String,
    pub table: String,
}

/// Settings for the prod → dev migration, read from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigrationConfig {
    pub prod: InstanceConfig,
    pub dev: InstanceConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub tables: Vec<MigrationEntry>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MIGRATION_DATA_DIR)
}

impl MigrationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MigrationConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `PROD_DB_DIR`, `DEV_DB_DIR` and `MIGRATION_DATA_DIR` when set.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("PROD_DB_DIR") {
            self.prod.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DEV_DB_DIR") {
            self.dev.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("MIGRATION_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| EtlError::Config(format!("{} has invalid value {:?}: {}", key, raw, e))),
        _ => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(EtlError::Config(format!("{} has invalid value {:?}", key, v))),
        },
    }
}
