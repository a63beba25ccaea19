pub mod catalog;
pub mod config;
pub mod conversion;
pub mod error;
pub mod seed;
pub mod telemetry;
