//! Tree replication.
//!
//! [`Replicator`] mirrors a directory of records into a sibling directory,
//! writing a redacted copy of every matching file at the same relative path.
//! Files that are not valid JSON are redacted as plain text instead.
//! Failures on individual files are counted and reported, never fatal.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::atomic::{ensure_dir, write_atomic};
use crate::error::{Error, Result};
use crate::redaction::{parse_document, Redactor};

/// How a file was redacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Parsed as JSON, redacted structurally, pretty-printed.
    Structured,
    /// Not JSON; redacted with value patterns only.
    Text,
}

/// A file that could not be redacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// The source path that failed.
    pub path: PathBuf,
    /// What went wrong.
    pub message: String,
}

/// Totals for one replication run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    /// Files written successfully.
    pub processed: usize,
    /// Files that failed.
    pub errors: usize,
    /// Processed files that were valid JSON.
    pub structured: usize,
    /// Processed files that went through the text fallback.
    pub text_fallback: usize,
    /// Details for each failure.
    pub failures: Vec<FileFailure>,
}

impl ReplicationReport {
    /// Total number of files seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.processed + self.errors
    }

    /// Check whether every file was processed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    fn record(&mut self, path: PathBuf, outcome: Result<FileOutcome>) {
        match outcome {
            Ok(FileOutcome::Structured) => {
                self.processed += 1;
                self.structured += 1;
            }
            Ok(FileOutcome::Text) => {
                self.processed += 1;
                self.text_fallback += 1;
            }
            Err(err) => self.fail(path, err.to_string()),
        }
    }

    fn fail(&mut self, path: PathBuf, message: String) {
        warn!(path = %path.display(), error = %message, "Error processing file");
        self.errors += 1;
        self.failures.push(FileFailure { path, message });
    }
}

/// Options for a replication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateOptions {
    /// Only files with this extension (case-insensitive) are redacted.
    /// `None` selects every regular file.
    pub extension: Option<String>,
    /// Maximum number of files processed at once by
    /// [`Replicator::replicate_concurrent`].
    pub workers: usize,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            extension: Some("json".to_string()),
            workers: 1,
        }
    }
}

/// Writes redacted mirrors of directory trees.
#[derive(Debug, Clone)]
pub struct Replicator {
    redactor: Arc<Redactor>,
    options: ReplicateOptions,
}

impl Replicator {
    /// Create a replicator sharing the given redactor.
    #[must_use]
    pub fn new(redactor: Arc<Redactor>, options: ReplicateOptions) -> Self {
        Self { redactor, options }
    }

    /// The options this replicator runs with.
    #[must_use]
    pub fn options(&self) -> &ReplicateOptions {
        &self.options
    }

    /// Redact every matching file under `source_root` into `target_root`,
    /// one file at a time.
    ///
    /// # Errors
    ///
    /// Returns an error only for setup failures: the source is not a
    /// directory, the target is inside the source, or the target cannot be
    /// created. Per-file failures are reported in the returned report.
    pub fn replicate(&self, source_root: &Path, target_root: &Path) -> Result<ReplicationReport> {
        let (files, mut report) = self.prepare_run(source_root, target_root)?;

        for relative in files {
            let source = source_root.join(&relative);
            let outcome = redact_file(&self.redactor, &source, &target_root.join(&relative));
            report.record(source, outcome);
        }

        info!(
            processed = report.processed,
            errors = report.errors,
            "Replication finished"
        );
        Ok(report)
    }

    /// Same as [`Replicator::replicate`], but runs up to `workers` files at
    /// once on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns an error only for setup failures, as for
    /// [`Replicator::replicate`].
    pub async fn replicate_concurrent(
        &self,
        source_root: &Path,
        target_root: &Path,
    ) -> Result<ReplicationReport> {
        let (files, mut report) = self.prepare_run(source_root, target_root)?;

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut handles = Vec::with_capacity(files.len());

        for relative in files {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::internal(format!("worker pool closed: {e}")))?;
            let redactor = Arc::clone(&self.redactor);
            let source = source_root.join(&relative);
            let target = target_root.join(&relative);
            let task_source = source.clone();

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                redact_file(&redactor, &task_source, &target)
            });
            handles.push((source, handle));
        }

        for (source, handle) in handles {
            match handle.await {
                Ok(outcome) => report.record(source, outcome),
                Err(join_err) => report.fail(source, format!("worker failed: {join_err}")),
            }
        }

        info!(
            processed = report.processed,
            errors = report.errors,
            workers = self.options.workers,
            "Replication finished"
        );
        Ok(report)
    }

    /// Validate the roots, create the target and list the files to process.
    fn prepare_run(
        &self,
        source_root: &Path,
        target_root: &Path,
    ) -> Result<(Vec<PathBuf>, ReplicationReport)> {
        check_roots(source_root, target_root)?;
        ensure_dir(target_root)?;

        let mut report = ReplicationReport::default();
        let files = self.collect_files(source_root, &mut report);
        info!(
            files = files.len(),
            source = %source_root.display(),
            target = %target_root.display(),
            "Redacting files"
        );
        Ok((files, report))
    }

    /// Relative paths of the files to redact, sorted by name.
    fn collect_files(&self, source_root: &Path, report: &mut ReplicationReport) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(source_root)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map_or_else(|| source_root.to_path_buf(), Path::to_path_buf);
                    report.fail(path, Error::from(err).to_string());
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.wants(entry.path()) {
                continue;
            }

            match entry.path().strip_prefix(source_root) {
                Ok(relative) => files.push(relative.to_path_buf()),
                Err(_) => report.fail(
                    entry.path().to_path_buf(),
                    "path escapes the source root".to_string(),
                ),
            }
        }

        files
    }

    fn wants(&self, path: &Path) -> bool {
        match &self.options.extension {
            None => true,
            Some(wanted) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted)),
        }
    }
}

/// Redact a single file from `source` into `target`.
///
/// The file is parsed as JSON and redacted structurally; if parsing fails,
/// the raw text is redacted with value patterns only. Either way the output
/// is written atomically. A document nested too deep to redact is an error
/// and nothing is written.
///
/// # Errors
///
/// Returns an error if the source cannot be read, is not UTF-8, or nests
/// deeper than [`crate::redaction::MAX_NESTING_DEPTH`], or if the target
/// cannot be written.
pub fn redact_file(redactor: &Redactor, source: &Path, target: &Path) -> Result<FileOutcome> {
    let bytes = fs::read(source).map_err(|source_err| Error::FileRead {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| Error::NotUtf8 {
        path: source.to_path_buf(),
    })?;

    match parse_document(&text) {
        Ok(value) => {
            let redacted = redactor.redact(&value);
            let rendered = serde_json::to_string_pretty(&redacted)?;
            write_atomic(target, rendered.as_bytes())?;
            debug!(path = %target.display(), "Created redacted copy");
            Ok(FileOutcome::Structured)
        }
        // Too deep to redact by key; text patterns alone would leak it
        Err(err @ Error::NestingTooDeep { .. }) => Err(err),
        Err(_) => {
            write_atomic(target, redactor.redact_text(&text).as_bytes())?;
            debug!(path = %target.display(), "Created redacted copy as text");
            Ok(FileOutcome::Text)
        }
    }
}

/// Sibling directory that redacted copies of `source_root` go to:
/// `{name}{suffix}` next to the source.
///
/// # Errors
///
/// Returns [`Error::SourceNotDirectory`] if the source does not exist or has
/// no usable name, and [`Error::ConfigValidation`] for a bad suffix.
pub fn redacted_target_for(source_root: &Path, suffix: &str) -> Result<PathBuf> {
    validate_suffix(suffix)?;
    let not_dir = || Error::SourceNotDirectory {
        path: source_root.to_path_buf(),
    };
    if !source_root.is_dir() {
        return Err(not_dir());
    }

    let canonical = source_root.canonicalize().map_err(|_| not_dir())?;
    let name = canonical.file_name().ok_or_else(not_dir)?;
    let parent = canonical.parent().ok_or_else(not_dir)?;

    let mut target_name = name.to_os_string();
    target_name.push(suffix);
    Ok(parent.join(target_name))
}

/// Check that `suffix` can only ever name a sibling of the source.
///
/// # Errors
///
/// Returns [`Error::ConfigValidation`] if the suffix is empty, contains a
/// path separator, or contains `..`.
pub fn validate_suffix(suffix: &str) -> Result<()> {
    if suffix.is_empty() {
        return Err(Error::config_validation(
            "replicate.suffix must not be empty",
        ));
    }
    if suffix.contains(['/', '\\']) || suffix.contains("..") {
        return Err(Error::config_validation(format!(
            "replicate.suffix '{suffix}' must not contain path separators or '..'"
        )));
    }
    Ok(())
}

/// Get `target_root` ready for a fresh run.
///
/// An existing target is an error unless `overwrite` is set, in which case
/// it is deleted recursively and recreated.
///
/// # Errors
///
/// Returns [`Error::TargetExists`] when the target exists and `overwrite`
/// is false, or an I/O error if it cannot be removed or created.
pub fn prepare_target(target_root: &Path, overwrite: bool) -> Result<()> {
    if target_root.exists() {
        if !overwrite {
            return Err(Error::TargetExists {
                path: target_root.to_path_buf(),
            });
        }
        info!(path = %target_root.display(), "Removing existing target directory");
        fs::remove_dir_all(target_root)?;
    }
    ensure_dir(target_root)
}

/// Check a pair of roots before anything is created or deleted.
///
/// # Errors
///
/// Returns [`Error::SourceNotDirectory`] if the source is not a directory,
/// or [`Error::TargetInsideSource`] if the target is the source or lies
/// anywhere under it.
pub fn check_roots(source_root: &Path, target_root: &Path) -> Result<()> {
    if !source_root.is_dir() {
        return Err(Error::SourceNotDirectory {
            path: source_root.to_path_buf(),
        });
    }

    let source = source_root.canonicalize()?;
    let target = resolve(target_root)?;
    if target.starts_with(&source) {
        return Err(Error::TargetInsideSource {
            source_root: source_root.to_path_buf(),
            target: target_root.to_path_buf(),
        });
    }
    Ok(())
}

/// Absolute form of a path that may not exist yet: the deepest existing
/// ancestor is canonicalized and the rest appended.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize()?;
    for part in rest.iter().rev() {
        resolved.push(part);
    }
    // `..` left in a missing suffix cannot be resolved by the file system
    let normalized = resolved.components().fold(PathBuf::new(), |mut acc, c| {
        match c {
            Component::ParentDir => {
                acc.pop();
            }
            Component::CurDir => {}
            other => acc.push(other.as_os_str()),
        }
        acc
    });
    Ok(normalized)
}
