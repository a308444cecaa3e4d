//! Built-in tools
//!
//! Small arithmetic tools used by the CLI demo registry and the tests.

pub mod math;

use std::sync::Arc;

pub use math::{AddTool, DivideTool, MultiplyTool};

use crate::tools::Tool;

/// The arithmetic tool set: `add`, `multiply`, `divide`
pub fn math_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(AddTool),
        Arc::new(MultiplyTool),
        Arc::new(DivideTool),
    ]
}
