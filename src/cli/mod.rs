//! Command-line interface for rowfill.

mod commands;
pub mod helpers;
pub mod progress;

pub use commands::{is_verbose, run};
