//! Envelope parsing for the Sentry SDK wire format.
//!
//! The envelope is a text protocol:
//! ```text
//! {envelope_header}\n
//! {item_header}\n
//! {item_payload}\n
//! ...
//! ```
//!
//! Parsing is lenient below the header line: a malformed item header skips
//! one line and resumes, unknown item types are carried through, and a
//! payload that is not JSON is retained as a string. Only a broken envelope
//! header aborts the parse.

use std::fmt;
use std::io::Read;

use chrono::Utc;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use faultline_core::time::format_ts;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("empty request body")]
    EmptyBody,
    #[error("invalid envelope header: {0}")]
    InvalidHeader(String),
    #[error("failed to decompress body: {0}")]
    Decompression(String),
}

/// The type of an envelope item.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Event payload encoded in JSON.
    Event,
    /// Transaction event payload encoded in JSON.
    Transaction,
    /// Session update data.
    Session,
    /// Aggregated session data.
    Sessions,
    /// Raw payload of an arbitrary attachment.
    Attachment,
    /// Multipart form data collected into a stream of JSON tuples.
    FormData,
    /// User feedback encoded as JSON.
    UserReport,
    /// Client internal report (eg: outcomes).
    ClientReport,
    /// Profile event payload encoded as JSON.
    Profile,
    /// Replay metadata and breadcrumb payload.
    ReplayEvent,
    /// Replay recording data.
    ReplayRecording,
    /// Monitor check-in encoded as JSON.
    CheckIn,
    /// A log for the log product, not internal logs.
    Log,
    /// A standalone span.
    Span,
    /// An item type this version does not know about.
    #[serde(other)]
    Unknown,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Transaction => "transaction",
            Self::Session => "session",
            Self::Sessions => "sessions",
            Self::Attachment => "attachment",
            Self::FormData => "form_data",
            Self::UserReport => "user_report",
            Self::ClientReport => "client_report",
            Self::Profile => "profile",
            Self::ReplayEvent => "replay_event",
            Self::ReplayRecording => "replay_recording",
            Self::CheckIn => "check_in",
            Self::Log => "log",
            Self::Span => "span",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemHeader {
    #[serde(rename = "type")]
    pub ty: ItemType,

    /// Byte length of the payload, taken from the start of the next line.
    /// Bytes beyond `length` on that line are ignored.
    #[serde(default)]
    pub length: Option<usize>,
}

/// One `(item_header, payload)` pair.
#[derive(Debug)]
pub struct EnvelopeItem {
    pub header: ItemHeader,
    /// JSON payload, or `Value::String` when the payload line is not JSON.
    pub payload: Value,
}

/// A parsed envelope.
#[derive(Debug)]
pub struct Envelope {
    pub header: Value,
    pub items: Vec<EnvelopeItem>,
}

impl Envelope {
    /// Parse an envelope from raw bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, EnvelopeError> {
        let text = String::from_utf8_lossy(data);
        let mut lines = text.lines();

        let header_line = loop {
            match lines.next() {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
                None => return Err(EnvelopeError::EmptyBody),
            }
        };

        let header: Value = serde_json::from_str(header_line)
            .map_err(|e| EnvelopeError::InvalidHeader(e.to_string()))?;
        if !header.is_object() {
            return Err(EnvelopeError::InvalidHeader(
                "envelope header must be a JSON object".to_string(),
            ));
        }

        let mut items = Vec::new();
        let mut lines = lines.peekable();

        while let Some(line) = lines.next() {
            if line.trim().is_empty() {
                continue;
            }

            let item_header: ItemHeader = match serde_json::from_str(line) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed item header");
                    continue;
                }
            };

            let Some(payload_line) = lines.next() else {
                tracing::warn!("item header without payload, dropping trailing item");
                break;
            };

            let raw_payload = match item_header.length {
                // Bytes past `length` on the payload line are ignored; an
                // over-long `length` just takes the whole line.
                Some(len) if len < payload_line.len() => {
                    payload_line.get(..len).unwrap_or(payload_line)
                }
                _ => payload_line,
            };

            let payload = serde_json::from_str(raw_payload)
                .unwrap_or_else(|_| Value::String(raw_payload.to_string()));

            items.push(EnvelopeItem {
                header: item_header,
                payload,
            });
        }

        Ok(Envelope { header, items })
    }
}

/// Pull the event payloads out of an envelope: items of type `event` or
/// `transaction` whose payload is a JSON object. Missing `event_id` and
/// `timestamp` fields are filled in.
pub fn extract_events(envelope: Envelope) -> Vec<Value> {
    envelope
        .items
        .into_iter()
        .filter(|item| {
            matches!(item.header.ty, ItemType::Event | ItemType::Transaction)
        })
        .filter_map(|item| match item.payload {
            Value::Object(map) => Some(Value::Object(map)),
            other => {
                tracing::warn!(
                    item_type = %item.header.ty,
                    payload_type = json_type_name(&other),
                    "dropping event item with non-object payload"
                );
                None
            }
        })
        .map(fill_event_defaults)
        .collect()
}

/// Ensure an event payload has an `event_id` and a `timestamp`.
pub fn fill_event_defaults(mut event: Value) -> Value {
    if let Some(map) = event.as_object_mut() {
        let has_event_id = map
            .get("event_id")
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !has_event_id {
            map.insert("event_id".to_string(), Value::String(generate_event_id()));
        }

        if !map.contains_key("timestamp") {
            map.insert("timestamp".to_string(), Value::String(format_ts(Utc::now())));
        }
    }
    event
}

/// A fresh 32-hex-character event identifier.
pub fn generate_event_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Normalize an SDK-supplied event id to the stored 32-hex form. Returns
/// `None` when the value is not a usable id.
pub fn normalize_event_id(raw: &str) -> Option<String> {
    let id: String = raw
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit())).then_some(id)
}

/// Whether a request body is the legacy single-event form: a JSON content
/// type and no item-header line (`\n` followed by `{`) anywhere in the body.
pub fn is_single_event_body(content_type: Option<&str>, body: &[u8]) -> bool {
    let is_json = content_type
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    is_json && !body.windows(2).any(|w| w == b"\n{")
}

/// Decompress a request body according to `Content-Encoding`. Anything
/// other than gzip is treated as identity.
pub fn decompress_body(
    content_encoding: Option<&str>,
    body: &[u8],
) -> Result<Vec<u8>, EnvelopeError> {
    let is_gzip = content_encoding
        .map(|v| v.to_lowercase().contains("gzip"))
        .unwrap_or(false);

    if !is_gzip {
        return Ok(body.to_vec());
    }

    let mut decoder = GzDecoder::new(body);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| EnvelopeError::Decompression(e.to_string()))?;

    Ok(decompressed)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_envelope() {
        let data = "{\"event_id\":\"9ec79c33ec9942ab8353589fcb2e04dc\"}\n{\"type\":\"event\"}\n{\"event_id\":\"9ec79c33ec9942ab8353589fcb2e04dc\",\"level\":\"error\",\"platform\":\"other\"}\n";

        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(envelope.items.len(), 1);
        assert_eq!(envelope.items[0].header.ty, ItemType::Event);
        assert_eq!(envelope.items[0].payload["level"], "error");
    }

    #[test]
    fn empty_body_is_a_parse_failure() {
        assert!(matches!(
            Envelope::from_slice(b""),
            Err(EnvelopeError::EmptyBody)
        ));
        assert!(matches!(
            Envelope::from_slice(b"\n\n"),
            Err(EnvelopeError::EmptyBody)
        ));
    }

    #[test]
    fn broken_header_aborts_the_envelope() {
        assert!(matches!(
            Envelope::from_slice(b"not json\n{\"type\":\"event\"}\n{}\n"),
            Err(EnvelopeError::InvalidHeader(_))
        ));
    }

    #[test]
    fn malformed_item_header_skips_one_line_and_resumes() {
        let data = "{}\nGARBAGE\n{\"type\":\"event\"}\n{\"message\":\"hi\"}\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(envelope.items.len(), 1);
        assert_eq!(envelope.items[0].payload["message"], "hi");
    }

    #[test]
    fn blank_lines_between_items_are_tolerated() {
        let data = "{}\n\n{\"type\":\"event\"}\n{\"message\":\"a\"}\n\n\n{\"type\":\"event\"}\n{\"message\":\"b\"}\n\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(envelope.items.len(), 2);
    }

    #[test]
    fn truncated_trailing_item_is_dropped() {
        let data = "{}\n{\"type\":\"event\"}\n{\"message\":\"ok\"}\n{\"type\":\"event\"}\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(envelope.items.len(), 1);
    }

    #[test]
    fn length_field_truncates_the_payload_line() {
        // length covers exactly {"a":1}; the junk after it is ignored
        let data = "{}\n{\"type\":\"event\",\"length\":7}\n{\"a\":1}IGNORED TRAILER\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(envelope.items.len(), 1);
        assert_eq!(envelope.items[0].payload["a"], 1);
    }

    #[test]
    fn oversized_length_takes_the_whole_line() {
        let data = "{}\n{\"type\":\"event\",\"length\":9999}\n{\"a\":1}\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(envelope.items[0].payload["a"], 1);
    }

    #[test]
    fn non_json_payload_is_retained_as_string() {
        let data = "{}\n{\"type\":\"attachment\"}\nraw bytes here\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(
            envelope.items[0].payload,
            Value::String("raw bytes here".to_string())
        );
    }

    #[test]
    fn unknown_item_types_are_carried_through() {
        let data = "{}\n{\"type\":\"profile_chunk_v9\"}\n{\"x\":1}\n{\"type\":\"event\"}\n{\"message\":\"hi\"}\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        assert_eq!(envelope.items.len(), 2);
        assert_eq!(envelope.items[0].header.ty, ItemType::Unknown);

        let events = extract_events(envelope);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["message"], "hi");
    }

    #[test]
    fn extract_events_takes_events_and_transactions_only() {
        let data = "{}\n{\"type\":\"event\"}\n{\"message\":\"e\"}\n{\"type\":\"session\"}\n{\"sid\":\"s\"}\n{\"type\":\"transaction\"}\n{\"transaction\":\"t\"}\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        let events = extract_events(envelope);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn extract_events_fills_event_id_and_timestamp() {
        let data = "{}\n{\"type\":\"event\"}\n{\"message\":\"hi\"}\n";
        let envelope = Envelope::from_slice(data.as_bytes()).unwrap();
        let events = extract_events(envelope);

        let id = events[0]["event_id"].as_str().unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(events[0]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn normalize_event_id_strips_hyphens_and_lowercases() {
        assert_eq!(
            normalize_event_id("9EC79C33-EC99-42AB-8353-589FCB2E04DC"),
            Some("9ec79c33ec9942ab8353589fcb2e04dc".to_string())
        );
        assert_eq!(normalize_event_id("short"), None);
        assert_eq!(normalize_event_id(""), None);
    }

    #[test]
    fn single_event_detection_needs_json_content_type_and_no_item_lines() {
        let event = br#"{"message":"hi"}"#;
        assert!(is_single_event_body(Some("application/json"), event));
        assert!(!is_single_event_body(Some("text/plain"), event));
        assert!(!is_single_event_body(None, event));

        let envelope = b"{}\n{\"type\":\"event\"}\n{\"message\":\"hi\"}\n";
        assert!(!is_single_event_body(Some("application/json"), envelope));
    }

    #[test]
    fn gzip_round_trip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let body = b"{}\n{\"type\":\"event\"}\n{\"message\":\"hi\"}\n";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = decompress_body(Some("gzip"), &compressed).unwrap();
        assert_eq!(decompressed, body);

        // identity passthrough
        assert_eq!(decompress_body(None, body).unwrap(), body);
        assert_eq!(decompress_body(Some("br"), body).unwrap(), body);
    }

    #[test]
    fn corrupt_gzip_is_a_decompression_failure() {
        let err = decompress_body(Some("gzip"), b"definitely not gzip").unwrap_err();
        assert!(matches!(err, EnvelopeError::Decompression(_)));
    }
}
