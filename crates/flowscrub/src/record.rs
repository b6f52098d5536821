//! The persisted record format.
//!
//! Every completed flow becomes one JSON file:
//!
//! ```json
//! {
//!   "timestamp": "20240115_093012_123456",
//!   "url": "https://api.example.com/v1/items",
//!   "method": "GET",
//!   "request": { "headers": { "Accept": "*/*" }, "content": null },
//!   "response": { "status_code": 200, "headers": { ... }, "content": "..." }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::flow::{Flow, FlowMessage};

/// Fragment used in file names when the request path is empty.
pub const EMPTY_FRAGMENT: &str = "root";

/// The request half of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRequest {
    /// Header names to values, in capture order.
    pub headers: Map<String, Value>,
    /// Decoded body, or null when there was none.
    pub content: Option<String>,
}

/// The response half of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Header names to values, in capture order.
    pub headers: Map<String, Value>,
    /// Decoded body, or null when there was none.
    pub content: Option<String>,
}

/// One recorded exchange as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Capture time, `YYYYMMDD_HHMMSS_ffffff`.
    pub timestamp: String,
    /// The full request URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// The request.
    pub request: RecordRequest,
    /// The response.
    pub response: RecordResponse,
}

impl Record {
    /// Build the record for a flow captured at `timestamp`.
    #[must_use]
    pub fn from_flow(flow: &Flow, timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            url: flow.url.clone(),
            method: flow.method.clone(),
            request: RecordRequest {
                headers: fold_headers(&flow.request),
                content: decode_body(&flow.request),
            },
            response: RecordResponse {
                status_code: flow.status_code,
                headers: fold_headers(&flow.response),
                content: decode_body(&flow.response),
            },
        }
    }

    /// File name for this record: `{method}_{fragment}_{timestamp}.json`.
    ///
    /// The fragment is the request path with separators turned into
    /// underscores, cut to `max_fragment_len` characters.
    #[must_use]
    pub fn file_name(&self, path: &str, max_fragment_len: usize) -> String {
        format!(
            "{}_{}_{}.json",
            self.method,
            path_fragment(path, max_fragment_len),
            self.timestamp
        )
    }
}

/// Turn a request path into a file-name-safe fragment.
#[must_use]
pub fn path_fragment(path: &str, max_len: usize) -> String {
    let fragment: String = path
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .take(max_len)
        .collect();
    if fragment.is_empty() {
        EMPTY_FRAGMENT.to_string()
    } else {
        fragment
    }
}

/// Collapse repeated header names (case-insensitively) into one entry under
/// the first spelling seen, joining the values with `", "`.
fn fold_headers(message: &FlowMessage) -> Map<String, Value> {
    let mut folded: Vec<(String, String)> = Vec::with_capacity(message.headers.len());
    for (name, value) in &message.headers {
        match folded
            .iter_mut()
            .find(|(seen, _)| seen.eq_ignore_ascii_case(name))
        {
            Some((_, joined)) => {
                joined.push_str(", ");
                joined.push_str(value);
            }
            None => folded.push((name.clone(), value.clone())),
        }
    }
    folded
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

/// Body as text. Empty bodies become `None`; bodies that are not UTF-8 are
/// replaced by a placeholder naming their size.
fn decode_body(message: &FlowMessage) -> Option<String> {
    let body = message.body.as_deref().filter(|b| !b.is_empty())?;
    Some(match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary data, {} bytes>", body.len()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn flow(request: FlowMessage, response: FlowMessage) -> Flow {
        Flow::new("POST", "https://api.example.com/v1/chat?x=1", request, 201, response)
    }

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_record_from_flow_shape() {
        let request = FlowMessage::new(
            headers(&[("Content-Type", "application/json")]),
            Some(br#"{"q": "hi"}"#.to_vec()),
        );
        let record = Record::from_flow(&flow(request, FlowMessage::default()), "20240115_093012_000001");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "20240115_093012_000001",
                "url": "https://api.example.com/v1/chat?x=1",
                "method": "POST",
                "request": {
                    "headers": {"Content-Type": "application/json"},
                    "content": "{\"q\": \"hi\"}",
                },
                "response": {"status_code": 201, "headers": {}, "content": null},
            })
        );
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let response = FlowMessage::new(
            headers(&[("Set-Cookie", "a=1"), ("Vary", "Accept"), ("set-cookie", "b=2")]),
            None,
        );
        let record = Record::from_flow(&flow(FlowMessage::default(), response), "t");

        let names: Vec<_> = record.response.headers.keys().cloned().collect();
        assert_eq!(names, vec!["Set-Cookie", "Vary"]);
        assert_eq!(record.response.headers["Set-Cookie"], json!("a=1, b=2"));
    }

    #[test]
    fn test_empty_body_is_null() {
        let request = FlowMessage::new(Vec::new(), Some(Vec::new()));
        let record = Record::from_flow(&flow(request, FlowMessage::default()), "t");
        assert!(record.request.content.is_none());
    }

    #[test]
    fn test_binary_body_placeholder() {
        let response = FlowMessage::new(Vec::new(), Some(vec![0x89, 0x50, 0x4e, 0x47, 0xff]));
        let record = Record::from_flow(&flow(FlowMessage::default(), response), "t");
        assert_eq!(
            record.response.content.as_deref(),
            Some("<binary data, 5 bytes>")
        );
    }

    #[test]
    fn test_path_fragment() {
        assert_eq!(path_fragment("/v1/items?page=2", 50), "_v1_items?page=2");
        assert_eq!(path_fragment("", 50), "root");
        assert_eq!(path_fragment("/", 50), "_");
        assert_eq!(path_fragment("a\\b", 50), "a_b");
    }

    #[test]
    fn test_path_fragment_truncates_by_chars() {
        let long = format!("/{}", "é".repeat(80));
        let fragment = path_fragment(&long, 50);
        assert_eq!(fragment.chars().count(), 50);
        assert!(fragment.starts_with("_é"));
    }

    #[test]
    fn test_file_name() {
        let record = Record::from_flow(
            &flow(FlowMessage::default(), FlowMessage::default()),
            "20240115_093012_000001",
        );
        assert_eq!(
            record.file_name("/v1/chat?x=1", 50),
            "POST__v1_chat?x=1_20240115_093012_000001.json"
        );
        assert_eq!(record.file_name("", 50), "POST_root_20240115_093012_000001.json");
    }

    #[test]
    fn test_record_deserializes() {
        let text = r#"{
            "timestamp": "t", "url": "u", "method": "GET",
            "request": {"headers": {}, "content": null},
            "response": {"status_code": 204, "headers": {"X": "1"}, "content": null}
        }"#;
        let record: Record = serde_json::from_str(text).unwrap();
        assert_eq!(record.response.status_code, 204);
        assert_eq!(record.response.headers["X"], json!("1"));
    }
}
