//! Charger log analytics CLI library.
//!
//! Wires file ingestion, the processing engine, and upload storage into the
//! `chargelog` command.

mod cli;
pub mod commands;
mod config;
pub mod ingest;
pub mod render;

pub use cli::{Cli, Commands};
pub use config::Config;
