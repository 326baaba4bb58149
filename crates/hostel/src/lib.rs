pub mod config;
pub mod error;
pub mod residence;
pub mod telemetry;
