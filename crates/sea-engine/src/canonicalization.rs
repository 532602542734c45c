//! Canonical JSON encoding of expression trees.
//!
//! The stable hash of an expression is taken over these bytes:
//! - object keys sorted lexicographically
//! - no insignificant whitespace
//! - numbers in serde_json's shortest form
//! - line endings in strings folded to `\n`

use crate::error::{Result, SeaError};
use crate::expression::Expression;
use serde_json::Value;
use std::fmt::Write;

/// Canonicalizes a JSON value to a deterministic string.
pub fn canonicalize(value: &Value) -> Result<String> {
    let mut output = String::new();
    write_canonical(&mut output, value)?;
    Ok(output)
}

/// Canonical encoding of an expression tree as it stands (callers normalize first).
pub fn canonicalize_expression(expr: &Expression) -> Result<String> {
    let value = serde_json::to_value(expr)?;
    canonicalize(&value)
}

fn write_canonical<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Null => writer.write_str("null")?,
        Value::Bool(b) => writer.write_str(if *b { "true" } else { "false" })?,
        Value::Number(n) => write!(writer, "{}", n)?,
        Value::String(s) => {
            let normalized = s.replace("\r\n", "\n").replace('\r', "\n");
            write_escaped_string(writer, &normalized)?;
        }
        Value::Array(arr) => {
            writer.write_char('[')?;
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    writer.write_char(',')?;
                }
                write_canonical(writer, item)?;
            }
            writer.write_char(']')?;
        }
        Value::Object(obj) => {
            writer.write_char('{')?;
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();

            let mut first = true;
            for key in keys {
                if let Some(value) = obj.get(key) {
                    if !first {
                        writer.write_char(',')?;
                    }
                    first = false;
                    write_escaped_string(writer, key)?;
                    writer.write_char(':')?;
                    write_canonical(writer, value)?;
                }
            }
            writer.write_char('}')?;
        }
    }
    Ok(())
}

fn write_escaped_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    writer.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => writer.write_str("\\\"")?,
            '\\' => writer.write_str("\\\\")?,
            '\n' => writer.write_str("\\n")?,
            '\r' => writer.write_str("\\r")?,
            '\t' => writer.write_str("\\t")?,
            c if c.is_control() => write!(writer, "\\u{:04x}", c as u32)?,
            c => writer.write_char(c)?,
        }
    }
    writer.write_char('"')?;
    Ok(())
}

impl From<std::fmt::Error> for SeaError {
    fn from(err: std::fmt::Error) -> Self {
        SeaError::Serialization(format!("Canonical encoding failed: {}", err))
    }
}
