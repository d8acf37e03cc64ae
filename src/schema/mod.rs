//! Schema module - Configuration and state types for program evolution.

mod config;
mod evolution;

pub use config::*;
pub use evolution::*;
