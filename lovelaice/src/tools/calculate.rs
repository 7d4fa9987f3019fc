//! `calculate`: arithmetic through the restricted evaluator.

use anyhow::Result;
use serde_json::{Value, json};

use super::{Effect, ToolDeps, ToolDescriptor, ToolHandler, ToolOutput, str_arg};
use crate::core::calc::{evaluate, format_value};

struct Calculate;

impl ToolHandler for Calculate {
    fn call(&self, args: &Value, _deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        let expression = str_arg(args, "expression")?;
        match evaluate(expression) {
            Ok(value) => Ok(ToolOutput::ok(format!(
                "{} = {}",
                expression.trim(),
                format_value(value)
            ))),
            Err(err) => Ok(ToolOutput::failed(format!("Invalid expression: {err}"))),
        }
    }
}

pub fn calculate() -> ToolDescriptor {
    ToolDescriptor::new(
        "calculate",
        "Evaluates an arithmetic expression. Supports numbers, + - * / % ^, \
         parentheses, the constants pi and e, and the functions sqrt, abs, min, \
         max, round, floor, ceil, ln, log (base 10), exp, sin, cos and tan.",
        Calculate,
    )
    .schema(json!({
        "type": "object",
        "properties": {
            "expression": {
                "type": "string",
                "description": "Expression to evaluate, e.g. '2 * (3 + 4)'.",
            },
        },
        "required": ["expression"],
        "additionalProperties": false,
    }))
    .effect(Effect::ReadOnly)
}
