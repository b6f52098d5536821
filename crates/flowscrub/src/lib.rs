//! `flowscrub` - Record HTTP flows to disk and scrub secrets out of them
//!
//! This library provides the redaction engine that replaces credentials and
//! identifiers in JSON and text, the replicator that writes redacted mirrors
//! of whole directory trees, and the recorder that persists captured flows as
//! one JSON file per exchange.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod atomic;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod logging;
pub mod record;
pub mod recorder;
pub mod redaction;
pub mod replicate;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};
pub use flow::{Flow, FlowMessage, FlowSource};
pub use logging::init_logging;
pub use record::Record;
pub use recorder::{Recorder, RecorderStats};
pub use redaction::{Redactor, RuleSet};
pub use replicate::{ReplicationReport, Replicator};
pub use source::JsonLinesSource;
