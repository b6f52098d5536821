//! Redaction of recorded flows.
//!
//! Two kinds of signal decide what is sensitive:
//!
//! - **Exact keys**: a mapping entry whose key (case-insensitively) is in the
//!   key table has its whole value replaced by that key's token, whatever the
//!   value's type.
//!
//! - **Value patterns**: every other string is passed through an ordered list
//!   of regular expressions, each match replaced by the pattern's token.
//!
//! Key matches always win over pattern matches. Tokens never match any
//! pattern, so redacting twice gives the same result as redacting once.
//!
//! # Example
//!
//! ```
//! use flowscrub::redaction::{Redactor, RuleSet};
//! use serde_json::json;
//!
//! let redactor = Redactor::new(RuleSet::builtin());
//!
//! let record = json!({"headers": {"Authorization": "Bearer abc123"}});
//! assert_eq!(
//!     redactor.redact(&record),
//!     json!({"headers": {"Authorization": "xxx-AUTH-TOKEN-xxx"}})
//! );
//!
//! let text = "request id 123e4567-e89b-12d3-a456-426614174000 ok";
//! assert_eq!(redactor.redact_text(text), "request id xxx-UUID-xxx ok");
//! ```

mod engine;
mod parse;
mod rules;

pub use engine::Redactor;
pub use parse::{parse_document, MAX_NESTING_DEPTH};
pub use rules::{RedactionPattern, RuleSet, BUILTIN_PATTERNS, BUILTIN_SENSITIVE_KEYS};
