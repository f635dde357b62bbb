// Shared kernel: configuration, errors, persistence and utilities used by
// every sync module.

pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod utils;
