//! Tracing setup for the `flowscrub` binary.
//!
//! Events from this crate are filtered by the CLI verbosity flags. Output
//! always goes to stderr; stdout carries only the run summary.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the binary logs, from the `-q` and `-v` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Run start, run end and per-file failures.
    #[default]
    Normal,
    /// Adds one line per redacted file or recorded flow.
    Verbose,
    /// Adds every key and pattern hit.
    Trace,
}

impl Verbosity {
    /// Pick a verbosity from the CLI flags. `quiet` wins over any `-v`.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Highest level emitted at this verbosity.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[must_use]
    pub fn directive(&self) -> String {
        format!("flowscrub={}", self.to_level_filter())
    }
}

/// Install the global subscriber. `RUST_LOG` replaces the verbosity
/// directive when set. Calling it again is a no-op.
///
/// ```no_run
/// use flowscrub::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .try_init();
}

/// Route warnings through the test harness so per-file failures show up
/// next to the failing test.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("flowscrub=warn")
        .with_test_writer()
        .try_init();
}
