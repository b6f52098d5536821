//! Parsing documents for structured redaction.
//!
//! serde_json refuses input nested deeper than 128 levels, and a refused
//! record would fall through to text redaction with its sensitive keys
//! intact. Documents are parsed without that limit instead, on a stack
//! that grows on demand, and rejected outright past [`MAX_NESTING_DEPTH`].

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Deepest nesting of arrays and objects accepted in a document.
pub const MAX_NESTING_DEPTH: usize = 1000;

/// Parse `text` as a single JSON document.
///
/// # Errors
///
/// Returns [`Error::NestingTooDeep`] if the document nests deeper than
/// [`MAX_NESTING_DEPTH`], or [`Error::Json`] if it is not valid JSON.
pub fn parse_document(text: &str) -> Result<Value> {
    let depth = nesting_depth(text);
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::NestingTooDeep {
            depth,
            limit: MAX_NESTING_DEPTH,
        });
    }

    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Deepest bracket nesting in `text`, ignoring brackets inside strings.
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}
