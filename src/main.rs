use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

use etl_tasks::config::{CustomerCleanConfig, EmployeeEtlConfig, MigrationConfig};
use etl_tasks::constants::DEFAULT_MIGRATION_CONFIG;
use etl_tasks::customers::CustomerCleaner;
use etl_tasks::logging;
use etl_tasks::migrate;
use etl_tasks::pipeline::loader::{LoadOutcome, ThreadSleeper};
use etl_tasks::pipeline::storage::{InMemoryEmployeeSink, SqliteEmployeeSink};
use etl_tasks::pipeline::{EmployeePipeline, RunReport};

#[derive(Parser)]
#[command(name = "etl_tasks")]
#[command(about = "Batch data tasks: employee ETL, customer cleaning, schema migration")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the employee CSV into the SQLite employees table
    Employees {
        /// Source CSV (overrides EMPLOYEE_CSV)
        #[arg(long)]
        input: Option<PathBuf>,
        /// SQLite database file (overrides DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Destination table (overrides EMPLOYEE_TABLE)
        #[arg(long)]
        table: Option<String>,
        /// Total load attempts (overrides LOAD_MAX_ATTEMPTS)
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Seconds between attempts (overrides LOAD_RETRY_DELAY_SECS)
        #[arg(long)]
        retry_delay_secs: Option<u64>,
        /// Where to write the batch if it cannot be loaded (overrides DEAD_LETTER_CSV)
        #[arg(long)]
        dead_letter: Option<PathBuf>,
        /// Transform only; load into memory instead of the database
        #[arg(long)]
        dry_run: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clean the customer CSV and write the cleaned copy
    CleanCustomers {
        /// Source CSV (overrides CUSTOMER_CSV)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output CSV (overrides CLEANED_CUSTOMER_CSV)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Copy the configured tables from the prod instance to the dev instance
    Migrate {
        /// Migration TOML file
        #[arg(long, default_value = DEFAULT_MIGRATION_CONFIG)]
        config: PathBuf,
    },
}

fn print_report(report: &RunReport) {
    println!("\n📊 Employee ETL results (run {}):", report.run_id);
    println!("   Rows read: {}", report.rows_read);
    println!("   Rows repaired: {}", report.rows_repaired);
    println!("   Ambiguous repairs: {}", report.ambiguous_repairs);
    println!("   Field fallbacks: {}", report.field_fallbacks);
    match &report.outcome {
        LoadOutcome::Success { attempts, rows } => {
            println!("✅ Loaded {} rows after {} attempt(s)", rows, attempts);
        }
        LoadOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            println!("❌ Load failed after {} attempts: {}", attempts, last_error);
        }
        LoadOutcome::Aborted { attempts, error } => {
            println!("❌ Load aborted on attempt {}: {}", attempts, error);
        }
    }
    if let Some(path) = &report.dead_letter {
        println!("⚠️  Unloaded rows written to {}", path.display());
    }
}

#[allow(clippy::too_many_arguments)]
fn run_employees(
    input: Option<PathBuf>,
    db: Option<PathBuf>,
    table: Option<String>,
    max_attempts: Option<u32>,
    retry_delay_secs: Option<u64>,
    dead_letter: Option<PathBuf>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<bool> {
    let mut config = EmployeeEtlConfig::from_env().context("loading employee ETL settings")?;
    if let Some(input) = input {
        config.input_path = input;
    }
    if let Some(db) = db {
        config.database_path = db;
    }
    if let Some(table) = table {
        config.table = table;
    }
    if let Some(max_attempts) = max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Some(secs) = retry_delay_secs {
        config.retry.delay = Duration::from_secs(secs);
    }
    if dead_letter.is_some() {
        config.dead_letter_path = dead_letter;
    }
    config.validate()?;

    println!("🔄 Running employee ETL from {}...", config.input_path.display());

    let report = if dry_run {
        info!("Dry run: loading into memory");
        let pipeline = EmployeePipeline::new(&config, InMemoryEmployeeSink::new(), ThreadSleeper);
        pipeline.run_path(&config.input_path)?
    } else {
        let sink = SqliteEmployeeSink::new(&config.database_path, &config.table)?;
        let pipeline = EmployeePipeline::new(&config, sink, ThreadSleeper);
        pipeline.run_path(&config.input_path)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report.outcome.is_success())
}

fn run_clean_customers(input: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<bool> {
    let mut config = CustomerCleanConfig::from_env().context("loading customer settings")?;
    if let Some(input) = input {
        config.input_path = input;
    }
    if let Some(output) = output {
        config.output_path = output;
    }

    println!("🔨 Cleaning customer data from {}...", config.input_path.display());
    let summary = CustomerCleaner::from_config(&config)
        .clean_file(&config.input_path, &config.output_path)
        .with_context(|| format!("cleaning {}", config.input_path.display()))?;

    println!("\n📊 Customer summary:");
    println!("   Rows: {}", summary.rows);
    for column in &summary.columns {
        println!("   {}: {} non-empty", column.column, column.non_empty);
    }
    if let Some(mean) = summary.age_mean {
        println!("   Age mean: {:.2}", mean);
    }
    if let Some(median) = summary.age_median {
        println!("   Age median: {:.1}", median);
    }
    if let Some(std) = summary.age_std {
        println!("   Age std: {:.2}", std);
    }
    println!("✅ Cleaned data written to {}", config.output_path.display());
    Ok(true)
}

fn run_migrate(config_path: PathBuf) -> anyhow::Result<bool> {
    let config = MigrationConfig::load(&config_path)?;
    println!("🚚 Migrating {} table(s) from prod to dev...", config.tables.len());

    let report = migrate::migrate(&config)?;
    for name in &report.migrated {
        println!("   ✅ {}", name);
    }
    if let Some(failure) = &report.failed {
        println!(
            "   ❌ {}.{}: {}",
            failure.schema, failure.table, failure.error
        );
    }
    Ok(report.is_complete())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Employees {
            input,
            db,
            table,
            max_attempts,
            retry_delay_secs,
            dead_letter,
            dry_run,
            json,
        } => {
            let span = tracing::info_span!("employees");
            let _enter = span.enter();
            run_employees(
                input,
                db,
                table,
                max_attempts,
                retry_delay_secs,
                dead_letter,
                dry_run,
                json,
            )
        }
        Commands::CleanCustomers { input, output } => {
            let span = tracing::info_span!("clean_customers");
            let _enter = span.enter();
            run_clean_customers(input, output)
        }
        Commands::Migrate { config } => {
            let span = tracing::info_span!("migrate");
            let _enter = span.enter();
            run_migrate(config)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            warn!("Task finished without completing");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Task failed: {:#}", e);
            println!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
