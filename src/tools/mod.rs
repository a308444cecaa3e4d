//! Tools module - tool abstraction, registry and execution
//!
//! Contains the `Tool` trait, the name-unique registry with its selection
//! schema, the concurrent executor and the built-in arithmetic tools.

pub mod builtin;
pub mod executor;
pub mod registry;
pub mod traits;

pub use executor::ToolExecutor;
pub use registry::{ToolRegistry, SELECTION_SCHEMA};
pub use traits::{Tool, ToolDefinition, ToolInstance};
