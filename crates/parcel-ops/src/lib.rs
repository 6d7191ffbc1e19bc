pub mod config;
pub mod error;
pub mod packages;
pub mod telemetry;
