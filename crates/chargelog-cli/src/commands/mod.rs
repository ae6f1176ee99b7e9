//! CLI subcommand implementations.

pub mod process;
pub mod upload;
pub mod uploads;
