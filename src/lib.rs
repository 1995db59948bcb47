// ABOUTME: Library root for nestkeeper - supervision of nested container engines.
// ABOUTME: The CLI binary in main.rs is a thin layer over these modules.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod nesting;
pub mod output;
pub mod runtime;
pub mod shell;
pub mod supervisor;
pub mod transfer;
pub mod types;
