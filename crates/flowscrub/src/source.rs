//! A flow source that reads JSON lines.
//!
//! Intercepting proxies can hand flows to `flowscrub record` by printing one
//! JSON object per completed exchange:
//!
//! ```json
//! {"method": "GET", "url": "https://api.example.com/v1/items",
//!  "request": {"headers": [["Accept", "*/*"]], "content": null},
//!  "response": {"status_code": 200, "headers": [["Content-Type", "text/plain"]],
//!               "content_base64": "aGVsbG8="}}
//! ```
//!
//! Bodies are given as UTF-8 text in `content`, or as raw bytes in
//! `content_base64`. `path` may be supplied when it differs from the URL's.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::flow::{path_of, Flow, FlowMessage, FlowSource};

const SOURCE_NAME: &str = "jsonl";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageEnvelope {
    headers: Vec<(String, String)>,
    content: Option<String>,
    content_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    status_code: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlowEnvelope {
    method: String,
    url: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    request: MessageEnvelope,
    response: ResponseEnvelope,
}

impl MessageEnvelope {
    fn into_message(self) -> Result<FlowMessage> {
        let body = decode_body(self.content, self.content_base64)?;
        Ok(FlowMessage::new(self.headers, body))
    }
}

impl ResponseEnvelope {
    fn into_message(self) -> Result<FlowMessage> {
        let body = decode_body(self.content, self.content_base64)?;
        Ok(FlowMessage::new(self.headers, body))
    }
}

/// Raw body bytes. `content_base64` wins when both forms are given.
fn decode_body(
    content: Option<String>,
    content_base64: Option<String>,
) -> Result<Option<Vec<u8>>> {
    match (content_base64, content) {
        (Some(encoded), _) => base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(Some)
            .map_err(|e| Error::invalid_flow(format!("bad content_base64: {e}"))),
        (None, Some(text)) => Ok(Some(text.into_bytes())),
        (None, None) => Ok(None),
    }
}

/// Parse one JSON line into a flow.
///
/// # Errors
///
/// Returns an error if the line is not a valid flow envelope.
pub fn parse_flow_line(line: &str) -> Result<Flow> {
    let envelope: FlowEnvelope = serde_json::from_str(line)?;
    if envelope.method.is_empty() {
        return Err(Error::invalid_flow("empty method"));
    }

    let path = envelope
        .path
        .unwrap_or_else(|| path_of(&envelope.url).to_string());
    let status_code = envelope.response.status_code;
    Ok(Flow {
        method: envelope.method,
        url: envelope.url,
        path,
        request: envelope.request.into_message()?,
        status_code,
        response: envelope.response.into_message()?,
    })
}

/// Reads flows, one JSON object per line, from an async reader.
pub struct JsonLinesSource<R> {
    reader: Mutex<Option<R>>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl JsonLinesSource<BufReader<Stdin>> {
    /// A source reading from standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// Create a source over `reader`.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Wait for the reading task to finish (end of input or stop).
    pub async fn join(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}

impl<R> std::fmt::Debug for JsonLinesSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSource")
            .field("running", &self.running.load(Ordering::SeqCst))
            .field("started", &self.task.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<R> FlowSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&mut self, tx: mpsc::Sender<Flow>) -> Result<()> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| Error::flow_source_start(SOURCE_NAME, "reader lock poisoned"))?
            .take()
            .ok_or_else(|| Error::flow_source_start(SOURCE_NAME, "already started"))?;

        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        self.task = Some(tokio::spawn(async move {
            let mut lines = reader.lines();
            let mut line_no = 0usize;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        line_no += 1;
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_flow_line(&line) {
                            Ok(flow) => {
                                if tx.send(flow).await.is_err() {
                                    debug!("Recorder went away, stopping source");
                                    break;
                                }
                            }
                            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed flow"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed to read flow input");
                        break;
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
            debug!(lines = line_no, "Flow input finished");
        }));

        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
