//! Core flow types for flowscrub.
//!
//! A [`Flow`] is one completed HTTP exchange as handed over by whatever is
//! intercepting traffic. Interception itself happens outside this crate;
//! implementations of [`FlowSource`] bridge it in.

use tokio::sync::mpsc;

use crate::error::Result;

/// One side of an exchange: headers as captured plus the raw body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMessage {
    /// Header pairs in wire order. Names keep their original case and may
    /// repeat.
    pub headers: Vec<(String, String)>,

    /// The raw body, if any.
    pub body: Option<Vec<u8>>,
}

impl FlowMessage {
    /// Create a message from header pairs and an optional body.
    #[must_use]
    pub fn new(headers: Vec<(String, String)>, body: Option<Vec<u8>>) -> Self {
        Self { headers, body }
    }

    /// Get the first value of a header, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Length of the body in bytes (0 when absent).
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }
}

/// A completed request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    /// HTTP method, e.g. `GET`.
    pub method: String,

    /// The full request URL.
    pub url: String,

    /// Request path including the query string, as sent on the wire.
    pub path: String,

    /// The request.
    pub request: FlowMessage,

    /// Response status code.
    pub status_code: u16,

    /// The response.
    pub response: FlowMessage,
}

impl Flow {
    /// Create a flow, deriving the path from the URL.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        request: FlowMessage,
        status_code: u16,
        response: FlowMessage,
    ) -> Self {
        let url = url.into();
        let path = path_of(&url).to_string();
        Self {
            method: method.into(),
            url,
            path,
            request,
            status_code,
            response,
        }
    }

    /// The authority part of the URL (host plus any port), which names the
    /// directory the flow is recorded under.
    #[must_use]
    pub fn host(&self) -> &str {
        authority_of(&self.url)
    }
}

/// Authority component of a URL: everything between `://` and the path.
fn authority_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

/// Path and query of a URL, without the fragment.
pub(crate) fn path_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let start = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let tail = &rest[start..];
    let end = tail.find('#').unwrap_or(tail.len());
    &tail[..end]
}

/// Trait for sources of completed flows.
///
/// Implementors push every completed exchange through the channel given to
/// [`FlowSource::start`]. Dropping the sender ends the recording session.
#[async_trait::async_trait]
pub trait FlowSource: Send + Sync {
    /// The name of this flow source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Check if the source is currently running.
    fn is_running(&self) -> bool;

    /// Start the source and begin sending flows.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to start, for example when it
    /// has already been started once.
    async fn start(&mut self, tx: mpsc::Sender<Flow>) -> Result<()>;

    /// Stop the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to stop cleanly.
    fn stop(&mut self) -> Result<()>;
}
