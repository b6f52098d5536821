//! Configuration management for flowscrub.
//!
//! This module provides configuration loading and validation using figment,
//! layering an optional TOML config file over built-in defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::redaction::{RuleSet, BUILTIN_PATTERNS, BUILTIN_SENSITIVE_KEYS};
use crate::replicate::{validate_suffix, ReplicateOptions};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "flowscrub";

/// Default directory that recorded flows are written to.
const DEFAULT_DATA_DIR: &str = "data";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. TOML config file (`--config`, or `~/.config/flowscrub/config.toml`)
/// 2. Default values
///
/// Tables merge key by key, so `[redaction.sensitive_keys]` entries in the
/// file extend the built-in keys, while a `[[redaction.patterns]]` array
/// replaces the built-in pattern list as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Redaction rule tables.
    pub redaction: RedactionConfig,
    /// Tree replication settings.
    pub replicate: ReplicateConfig,
    /// Flow recorder settings.
    pub recorder: RecorderConfig,
}

/// Redaction rule tables as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Key name to replacement token. Matching is case-insensitive.
    pub sensitive_keys: BTreeMap<String, String>,
    /// Ordered value patterns. Order matters.
    pub patterns: Vec<PatternConfig>,
}

/// One entry in the pattern table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Name used in logs.
    pub name: String,
    /// Regular expression to match.
    pub pattern: String,
    /// Literal replacement token.
    pub replacement: String,
}

/// Tree replication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateConfig {
    /// File extension to redact. An empty string selects every file.
    pub extension: String,
    /// Suffix appended to the source directory name to form the target.
    pub suffix: String,
    /// Number of files processed concurrently.
    pub workers: usize,
    /// Replace an existing target directory without asking.
    pub overwrite: bool,
}

/// Flow recorder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory that records are written to.
    /// Defaults to `./data`
    pub data_dir: Option<PathBuf>,
    /// Maximum length of the path fragment in record file names.
    pub max_fragment_len: usize,
    /// Capacity of the channel between flow sources and the recorder.
    pub channel_capacity: usize,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            sensitive_keys: BUILTIN_SENSITIVE_KEYS
                .iter()
                .map(|(key, token)| ((*key).to_string(), (*token).to_string()))
                .collect(),
            patterns: BUILTIN_PATTERNS
                .iter()
                .map(|(name, pattern, replacement)| PatternConfig {
                    name: (*name).to_string(),
                    pattern: (*pattern).to_string(),
                    replacement: (*replacement).to_string(),
                })
                .collect(),
        }
    }
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            extension: "json".to_string(),
            suffix: "_redacted".to_string(),
            workers: 1,
            overwrite: false,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            data_dir: None, // Resolved at runtime
            max_fragment_len: 50,
            channel_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from the default config file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid, a pattern
    /// does not compile, or a replacement token would itself be redacted.
    pub fn validate(&self) -> Result<()> {
        if self.replicate.workers == 0 {
            return Err(Error::config_validation(
                "replicate.workers must be greater than 0",
            ));
        }

        validate_suffix(&self.replicate.suffix)?;

        if self.recorder.max_fragment_len == 0 {
            return Err(Error::config_validation(
                "recorder.max_fragment_len must be greater than 0",
            ));
        }

        if self.recorder.channel_capacity == 0 {
            return Err(Error::config_validation(
                "recorder.channel_capacity must be greater than 0",
            ));
        }

        // Compiles every pattern and checks the token invariant
        RuleSet::from_config(&self.redaction)?;

        Ok(())
    }

    /// Build the redaction rule set described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule tables are invalid.
    pub fn rule_set(&self) -> Result<RuleSet> {
        RuleSet::from_config(&self.redaction)
    }

    /// Get the replication options described by this configuration.
    #[must_use]
    pub fn replicate_options(&self) -> ReplicateOptions {
        let extension = if self.replicate.extension.is_empty() {
            None
        } else {
            Some(self.replicate.extension.clone())
        };
        ReplicateOptions {
            extension,
            workers: self.replicate.workers,
        }
    }

    /// Get the recorder data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.recorder
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}
