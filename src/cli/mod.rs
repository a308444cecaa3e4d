//! CLI module - command-line interface
//!
//! Contains the REPL, the event printer and command parsing.

pub mod commands;
pub mod repl;

pub use repl::{EventPrinter, Repl};
