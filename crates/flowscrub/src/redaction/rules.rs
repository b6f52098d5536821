//! Sensitivity rule tables.
//!
//! A [`RuleSet`] holds the exact-key table and the ordered pattern table the
//! redactor consults. The built-in tables target HTTP traffic: auth and
//! tracing headers by name, plus JWTs, UUIDs and long hex runs by shape.

use std::collections::HashMap;

use regex::{NoExpand, Regex};

use crate::config::RedactionConfig;
use crate::error::{Error, Result};

/// Built-in sensitive keys and their replacement tokens.
pub const BUILTIN_SENSITIVE_KEYS: &[(&str, &str)] = &[
    // Authentication and authorization
    ("authorization", "xxx-AUTH-TOKEN-xxx"),
    ("x-client-key", "xxx-CLIENT-KEY-xxx"),
    ("x-cursor-checksum", "xxx-CHECKSUM-xxx"),
    ("x-cursor-config-version", "xxx-CONFIG-VERSION-xxx"),
    // Request and trace identifiers
    ("traceparent", "xxx-TRACE-ID-xxx"),
    ("x-request-id", "xxx-REQUEST-ID-xxx"),
    ("x-amzn-trace-id", "xxx-TRACE-ID-xxx"),
    // Session identifiers
    ("x-session-id", "xxx-SESSION-ID-xxx"),
    ("x-api-key", "xxx-API-KEY-xxx"),
    ("cookie", "xxx-COOKIE-xxx"),
];

/// Built-in value patterns as `(name, pattern, replacement)`, in application order.
pub const BUILTIN_PATTERNS: &[(&str, &str, &str)] = &[
    (
        "jwt",
        r"eyJ[a-zA-Z0-9_-]{5,}\.eyJ[a-zA-Z0-9_-]{5,}\.?[a-zA-Z0-9_-]{5,}?",
        "xxx-JWT-TOKEN-xxx",
    ),
    (
        "uuid",
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        "xxx-UUID-xxx",
    ),
    ("hex", r"\b[0-9a-f]{16,}\b", "xxx-HEX-xxx"),
];

/// A compiled value pattern with its replacement token.
#[derive(Debug, Clone)]
pub struct RedactionPattern {
    /// Name of the pattern for identification.
    pub name: String,

    /// Token substituted for every match.
    pub replacement: String,

    /// The compiled regex.
    regex: Regex,
}

impl RedactionPattern {
    /// Create a new pattern from a known-good expression.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid. Use [`RedactionPattern::compile`]
    /// for patterns that come from configuration.
    #[must_use]
    pub fn new(name: &str, pattern: &str, replacement: &str) -> Self {
        Self::compile(name, pattern, replacement).expect("Invalid regex pattern")
    }

    /// Compile a pattern, reporting invalid expressions as errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the expression does not compile.
    pub fn compile(name: &str, pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            name: name.to_string(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            replacement: replacement.to_string(),
            regex,
        })
    }

    /// Check if the content matches this pattern.
    #[must_use]
    pub fn matches(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }

    /// Source text of the compiled expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Replace every non-overlapping match with the replacement token.
    ///
    /// The token is inserted literally; `$` has no special meaning in it.
    #[must_use]
    pub fn redact(&self, content: &str) -> String {
        self.regex
            .replace_all(content, NoExpand(&self.replacement))
            .into_owned()
    }
}

/// The exact-key table and the ordered pattern table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    keys: HashMap<String, String>,
    patterns: Vec<RedactionPattern>,
}

impl RuleSet {
    /// An empty rule set that redacts nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
            patterns: Vec::new(),
        }
    }

    /// The built-in rule set.
    #[must_use]
    pub fn builtin() -> Self {
        let mut rules = Self::empty();
        for (key, token) in BUILTIN_SENSITIVE_KEYS {
            rules = rules.with_key(key, token);
        }
        for (name, pattern, replacement) in BUILTIN_PATTERNS {
            rules = rules.with_pattern(RedactionPattern::new(name, pattern, replacement));
        }
        rules
    }

    /// Build a rule set from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern does not compile, or if any replacement
    /// token would itself be matched by a pattern. The latter would make
    /// redaction non-idempotent.
    pub fn from_config(config: &RedactionConfig) -> Result<Self> {
        let mut rules = Self::empty();
        for (key, token) in &config.sensitive_keys {
            rules = rules.with_key(key, token);
        }
        for entry in &config.patterns {
            rules = rules.with_pattern(RedactionPattern::compile(
                &entry.name,
                &entry.pattern,
                &entry.replacement,
            )?);
        }
        rules.check_tokens()?;
        Ok(rules)
    }

    /// Add a sensitive key. The key is stored lower-cased.
    #[must_use]
    pub fn with_key(mut self, key: &str, token: &str) -> Self {
        self.keys.insert(key.to_lowercase(), token.to_string());
        self
    }

    /// Append a pattern to the end of the pattern table.
    #[must_use]
    pub fn with_pattern(mut self, pattern: RedactionPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Look up the replacement token for a key, ignoring case.
    #[must_use]
    pub fn replacement_for_key(&self, key: &str) -> Option<&str> {
        self.keys.get(&key.to_lowercase()).map(String::as_str)
    }

    /// The pattern table, in application order.
    #[must_use]
    pub fn patterns(&self) -> &[RedactionPattern] {
        &self.patterns
    }

    /// Number of sensitive keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Verify that no replacement token matches any pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the first offending token.
    pub fn check_tokens(&self) -> Result<()> {
        let key_tokens = self
            .keys
            .iter()
            .map(|(key, token)| (format!("key '{key}'"), token));
        let pattern_tokens = self
            .patterns
            .iter()
            .map(|p| (format!("pattern '{}'", p.name), &p.replacement));

        for (owner, token) in key_tokens.chain(pattern_tokens) {
            if let Some(hit) = self.patterns.iter().find(|p| p.matches(token)) {
                return Err(Error::config_validation(format!(
                    "replacement token for {owner} is matched by pattern '{}'",
                    hit.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}
