/// Column names shared by the employee source file, the normalized record
/// and the destination table.
pub mod columns {
    pub const BIRTH_DATE: &str = "BirthDate";
    pub const FIRST_NAME: &str = "FirstName";
    pub const LAST_NAME: &str = "LastName";
    pub const SALARY: &str = "Salary";
    pub const DEPARTMENT: &str = "Department";
    pub const EMPLOYEE_ID: &str = "EmployeeID";

    // Derived during normalization
    pub const AGE: &str = "Age";
    pub const SALARY_BUCKET: &str = "SalaryBucket";
    pub const FULL_NAME: &str = "FullName";
}

use columns::*;

/// Target shape of a repaired employee row, in source order.
pub const EXPECTED_SCHEMA: [&str; 6] = [
    BIRTH_DATE,
    FIRST_NAME,
    LAST_NAME,
    SALARY,
    DEPARTMENT,
    EMPLOYEE_ID,
];

/// Destination projection, in output order.
pub const OUTPUT_COLUMNS: [&str; 6] = [
    EMPLOYEE_ID,
    DEPARTMENT,
    SALARY,
    FULL_NAME,
    AGE,
    SALARY_BUCKET,
];

pub const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_REFERENCE_YEAR: i32 = 2023;
pub const UNKNOWN_DEPARTMENT: &str = "Unknown";
pub const DEPARTMENT_PLACEHOLDER: &str = "-";

/// Salary bucket thresholds (half-open, lower bound inclusive)
pub const BUCKET_B_FLOOR: i64 = 50_000;
pub const BUCKET_C_FLOOR: i64 = 100_000;

// Loader defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;
pub const DEFAULT_TABLE: &str = "employees";
pub const DEFAULT_EMPLOYEE_CSV: &str = "data/employee_details.csv";
pub const DEFAULT_DB_PATH: &str = "data/employees.db";

// Customer cleaning
pub const DEFAULT_CUSTOMER_CSV: &str = "data/CustomerData.csv";
pub const DEFAULT_CLEANED_CUSTOMER_CSV: &str = "data/Cleaned_CustomerData.csv";
pub const DEFAULT_EMAIL: &str = "myuser@example.com";
pub const UNKNOWN_PHONE: &str = "Unknown";

// Migration
pub const DEFAULT_MIGRATION_CONFIG: &str = "migration.toml";
pub const DEFAULT_MIGRATION_DATA_DIR: &str = "data";
