pub mod config;
pub mod constants;
pub mod customers;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod observability;
pub mod pipeline;
pub mod types;
