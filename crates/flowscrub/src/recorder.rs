//! The flow recorder.
//!
//! Writes one JSON record per completed flow to
//! `{data_dir}/{host}/{method}_{fragment}_{timestamp}.json`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, SubsecRound};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::atomic::write_atomic;
use crate::error::{Error, Result};
use crate::flow::Flow;
use crate::record::Record;

/// Timestamp layout used in records and file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Default maximum length of the path fragment in file names.
pub const DEFAULT_MAX_FRAGMENT_LEN: usize = 50;

/// Counts for one recording session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Flows written to disk.
    pub recorded: usize,
    /// Flows that could not be written.
    pub failed: usize,
}

/// Persists flows as record files.
#[derive(Debug)]
pub struct Recorder {
    data_dir: PathBuf,
    max_fragment_len: usize,
    last_timestamp: Option<NaiveDateTime>,
}

impl Recorder {
    /// Create a recorder writing under `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_fragment_len: DEFAULT_MAX_FRAGMENT_LEN,
            last_timestamp: None,
        }
    }

    /// Set the maximum length of the path fragment in file names.
    #[must_use]
    pub fn with_max_fragment_len(mut self, max_fragment_len: usize) -> Self {
        self.max_fragment_len = max_fragment_len.max(1);
        self
    }

    /// The directory records are written under.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Record a flow captured now.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow has no usable host or the file cannot be
    /// written.
    pub fn record(&mut self, flow: &Flow) -> Result<PathBuf> {
        self.record_at(flow, Local::now().naive_local())
    }

    /// Record a flow captured at `now`.
    ///
    /// Timestamps are kept strictly increasing at microsecond resolution,
    /// so two flows never share a timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow has no usable host or the file cannot be
    /// written.
    pub fn record_at(&mut self, flow: &Flow, now: NaiveDateTime) -> Result<PathBuf> {
        let host_dir = self.host_dir(flow)?;
        let timestamp = self.next_timestamp(now);

        let record = Record::from_flow(flow, timestamp);
        let path = host_dir.join(record.file_name(&flow.path, self.max_fragment_len));
        let rendered = serde_json::to_string_pretty(&record)?;
        write_atomic(&path, rendered.as_bytes())?;

        info!(method = %flow.method, url = %flow.url, path = %path.display(), "Recorded flow");
        Ok(path)
    }

    /// Drain `rx`, recording every flow until all senders are gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Flow>) -> RecorderStats {
        let mut stats = RecorderStats::default();
        info!(data_dir = %self.data_dir.display(), "Recorder started");

        while let Some(flow) = rx.recv().await {
            match self.record(&flow) {
                Ok(_) => stats.recorded += 1,
                Err(e) => {
                    warn!(url = %flow.url, error = %e, "Failed to record flow");
                    stats.failed += 1;
                }
            }
        }

        info!(
            recorded = stats.recorded,
            failed = stats.failed,
            "Recorder stopped"
        );
        stats
    }

    fn host_dir(&self, flow: &Flow) -> Result<PathBuf> {
        let host = flow.host();
        if host.is_empty() || host == "." || host == ".." || host.contains('\\') {
            return Err(Error::invalid_flow(format!(
                "no usable host in URL {}",
                flow.url
            )));
        }
        Ok(self.data_dir.join(host))
    }

    fn next_timestamp(&mut self, now: NaiveDateTime) -> String {
        let mut now = now.trunc_subsecs(6);
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now.format(TIMESTAMP_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use super::*;
    use crate::flow::FlowMessage;
    use crate::logging::init_test_logging;

    fn at(micros: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_micro_opt(9, 30, 12, micros)
            .unwrap()
    }

    fn flow(url: &str) -> Flow {
        Flow::new(
            "GET",
            url,
            FlowMessage::new(vec![("Authorization".to_string(), "Bearer t".to_string())], None),
            200,
            FlowMessage::new(Vec::new(), Some(b"hello".to_vec())),
        )
    }

    #[test]
    fn test_record_writes_under_host_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path());

        let path = recorder
            .record_at(&flow("https://api.example.com/v1/items"), at(42))
            .unwrap();

        assert_eq!(
            path,
            dir.path()
                .join("api.example.com")
                .join("GET__v1_items_20240115_093012_000042.json")
        );
        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["timestamp"], json!("20240115_093012_000042"));
        assert_eq!(value["request"]["headers"]["Authorization"], json!("Bearer t"));
        assert_eq!(value["response"]["content"], json!("hello"));
    }

    #[test]
    fn test_record_root_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path());

        let path = recorder
            .record_at(&flow("http://localhost:8080"), at(1))
            .unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "GET_root_20240115_093012_000001.json"
        );
        assert!(path.starts_with(dir.path().join("localhost:8080")));
    }

    #[test]
    fn test_record_truncates_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path()).with_max_fragment_len(5);

        let path = recorder
            .record_at(&flow("https://h.test/abcdefghij"), at(1))
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "GET__abcd_20240115_093012_000001.json");
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path());
        let f = flow("https://h.test/same");

        let first = recorder.record_at(&f, at(10)).unwrap();
        let second = recorder.record_at(&f, at(10)).unwrap();
        let third = recorder.record_at(&f, at(5)).unwrap();

        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("_000011.json"));
        assert!(third.to_string_lossy().ends_with("_000012.json"));
    }

    #[test]
    fn test_record_rejects_missing_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path());

        let err = recorder.record_at(&flow("/relative/only"), at(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidFlow { .. }));
        let err = recorder.record_at(&flow("http://../x"), at(2)).unwrap_err();
        assert!(matches!(err, Error::InvalidFlow { .. }));
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path());
        let (tx, rx) = mpsc::channel(4);

        let handle = tokio::spawn(recorder.run(rx));
        tx.send(flow("https://a.test/x")).await.unwrap();
        tx.send(flow("/no/host")).await.unwrap();
        tx.send(flow("https://b.test/y")).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats, RecorderStats { recorded: 2, failed: 1 });
        assert!(dir.path().join("a.test").is_dir());
        assert!(dir.path().join("b.test").is_dir());
    }
}
