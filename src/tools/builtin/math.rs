//! Arithmetic tools

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{Result, StepwiseError};
use crate::tools::Tool;

/// Largest magnitude printed without a fractional part
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn operand_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {
                "type": "number",
                "description": "First operand"
            },
            "b": {
                "type": "number",
                "description": "Second operand"
            }
        },
        "required": ["a", "b"],
        "additionalProperties": false
    })
}

fn operands(args: &Value) -> Result<(f64, f64)> {
    let get = |key: &str| {
        args.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| StepwiseError::tool(format!("argument `{}` must be a number", key)))
    };
    Ok((get("a")?, get("b")?))
}

/// Render a result the way a person would write it: `5`, not `5.0`
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// `a + b`
#[derive(Debug, Clone, Copy, Default)]
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers and return the sum"
    }

    fn input_schema(&self) -> Value {
        operand_schema()
    }

    async fn call(&self, args: &Value) -> Result<String> {
        let (a, b) = operands(args)?;
        Ok(format_number(a + b))
    }
}

/// `a * b`
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply two numbers and return the product"
    }

    fn input_schema(&self) -> Value {
        operand_schema()
    }

    async fn call(&self, args: &Value) -> Result<String> {
        let (a, b) = operands(args)?;
        Ok(format_number(a * b))
    }
}

/// `a / b`, failing on a zero divisor
#[derive(Debug, Clone, Copy, Default)]
pub struct DivideTool;

#[async_trait]
impl Tool for DivideTool {
    fn name(&self) -> &str {
        "divide"
    }

    fn description(&self) -> &str {
        "Divide the first number by the second and return the quotient"
    }

    fn input_schema(&self) -> Value {
        operand_schema()
    }

    async fn call(&self, args: &Value) -> Result<String> {
        let (a, b) = operands(args)?;
        if b == 0.0 {
            return Err(StepwiseError::tool("division by zero"));
        }
        Ok(format_number(a / b))
    }
}
