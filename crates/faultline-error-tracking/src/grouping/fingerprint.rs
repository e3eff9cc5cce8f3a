//! Fingerprint computation and issue metadata derivation.
//!
//! Grouping priority, highest first: explicit SDK fingerprint tokens, the
//! first exception value, the bare message, and finally the event id (no
//! grouping). The hash must be deterministic across process restarts, so a
//! SHA-256 prefix is used rather than anything seeded.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use faultline_entities::IssueLevel;

use super::normalize_message;

const FINGERPRINT_HEX_LEN: usize = 16;
const TITLE_VALUE_MAX: usize = 97;
const TITLE_MESSAGE_MAX: usize = 125;
const METADATA_VALUE_MAX: usize = 200;
const GROUPING_FRAMES: usize = 3;

/// Everything the ingest path derives from an event in one pass.
#[derive(Debug, Clone)]
pub struct EventGrouping {
    pub fingerprint: String,
    pub title: String,
    pub culprit: Option<String>,
    pub level: IssueLevel,
    pub metadata: Value,
}

/// Compute the grouping key plus title/culprit/level/metadata for an event.
pub fn group_event(event: &Value) -> EventGrouping {
    EventGrouping {
        fingerprint: fingerprint_event(event),
        title: derive_title(event),
        culprit: derive_culprit(event),
        level: resolve_level(event),
        metadata: derive_metadata(event),
    }
}

/// The deterministic grouping key for an event.
pub fn fingerprint_event(event: &Value) -> String {
    // 1. Explicit SDK fingerprint
    if let Some(tokens) = explicit_tokens(event) {
        return hash_components(&tokens);
    }

    // 2. Exception type + normalized message + top frames
    if let Some(exception) = first_exception(event) {
        let ty = exception
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("Error");
        let message = exception
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut components = vec![ty.to_string(), normalize_message(message)];
        for frame in grouping_frames(exception) {
            components.push(frame_signature(frame));
        }
        return hash_components(&components);
    }

    // 3. Bare message
    if let Some(message) = event_message(event) {
        let level = event
            .get("level")
            .and_then(Value::as_str)
            .unwrap_or("error");
        return hash_components(&[level.to_string(), normalize_message(&message)]);
    }

    // 4. No grouping signal at all: the event id keeps events apart
    let event_id = event
        .get("event_id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    hash_components(&[event_id.to_string()])
}

fn hash_components(components: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(components.join("||").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FINGERPRINT_HEX_LEN].to_string()
}

/// Explicit fingerprint tokens, honored when at least one token is not the
/// `{{ default }}` placeholder.
fn explicit_tokens(event: &Value) -> Option<Vec<String>> {
    let tokens: Vec<String> = event
        .get("fingerprint")?
        .as_array()?
        .iter()
        .filter_map(|t| match t {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    if tokens.is_empty() || tokens.iter().all(|t| t == "{{ default }}") {
        return None;
    }
    Some(tokens)
}

/// The first exception value of the event, tolerating both the canonical
/// `{"values": […]}` wrapper and a bare array.
fn first_exception(event: &Value) -> Option<&Value> {
    let exception = event.get("exception")?;
    let values = match exception {
        Value::Array(values) => values,
        other => other.get("values")?.as_array()?,
    };
    values.iter().find(|v| v.is_object())
}

/// Frames used for grouping and the "top frame" derivations: SDKs emit
/// oldest-first, so reverse, prefer in-app frames, and keep the top three.
fn grouping_frames(exception: &Value) -> Vec<&Value> {
    let Some(frames) = exception
        .get("stacktrace")
        .and_then(|st| st.get("frames"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let newest_first: Vec<&Value> = frames.iter().rev().collect();
    let in_app: Vec<&Value> = newest_first
        .iter()
        .copied()
        .filter(|f| f.get("in_app").and_then(Value::as_bool).unwrap_or(false))
        .collect();

    let source = if in_app.is_empty() { newest_first } else { in_app };
    source.into_iter().take(GROUPING_FRAMES).collect()
}

fn top_frame(event: &Value) -> Option<&Value> {
    first_exception(event).and_then(|exc| grouping_frames(exc).into_iter().next())
}

/// `filename:function:lineno`, omitting absent components. Query strings
/// and fragments are stripped from filenames so cache-busted URLs group
/// together.
fn frame_signature(frame: &Value) -> String {
    let mut parts = Vec::new();
    if let Some(filename) = frame.get("filename").and_then(Value::as_str) {
        parts.push(strip_query_and_fragment(filename).to_string());
    }
    if let Some(function) = frame.get("function").and_then(Value::as_str) {
        parts.push(function.to_string());
    }
    if let Some(lineno) = frame.get("lineno").and_then(Value::as_i64) {
        parts.push(lineno.to_string());
    }
    parts.join(":")
}

fn strip_query_and_fragment(filename: &str) -> &str {
    let end = filename
        .find(['?', '#'])
        .unwrap_or(filename.len());
    &filename[..end]
}

fn event_message(event: &Value) -> Option<String> {
    let raw = match event.get("message") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj
            .get("formatted")
            .or_else(|| obj.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };
    if let Some(message) = raw.filter(|m| !m.is_empty()) {
        return Some(message);
    }

    // logentry is the older SDK spelling of message
    event
        .get("logentry")
        .and_then(|le| {
            le.get("formatted")
                .or_else(|| le.get("message"))
                .and_then(Value::as_str)
        })
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn resolve_level(event: &Value) -> IssueLevel {
    event
        .get("level")
        .and_then(Value::as_str)
        .and_then(|l| l.parse().ok())
        .unwrap_or(IssueLevel::Error)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

fn derive_title(event: &Value) -> String {
    if let Some(exception) = first_exception(event) {
        let ty = exception
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("Error");
        let value = exception
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if value.is_empty() {
            return ty.to_string();
        }
        return format!("{ty}: {}", truncate_chars(value, TITLE_VALUE_MAX));
    }

    if let Some(message) = event_message(event) {
        return truncate_chars(&message, TITLE_MESSAGE_MAX);
    }

    "Unknown Error".to_string()
}

fn derive_culprit(event: &Value) -> Option<String> {
    if let Some(transaction) = event
        .get("transaction")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    {
        return Some(transaction.to_string());
    }

    let frame = top_frame(event)?;
    let mut parts = Vec::new();
    if let Some(filename) = frame.get("filename").and_then(Value::as_str) {
        parts.push(filename.to_string());
    }
    if let Some(function) = frame.get("function").and_then(Value::as_str) {
        parts.push(format!("in {function}"));
    }
    if let Some(lineno) = frame.get("lineno").and_then(Value::as_i64) {
        parts.push(format!("at line {lineno}"));
    }

    (!parts.is_empty()).then(|| parts.join(" "))
}

fn derive_metadata(event: &Value) -> Value {
    let (ty, value) = match first_exception(event) {
        Some(exception) => (
            exception
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("Error")
                .to_string(),
            exception
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        None => (
            "Error".to_string(),
            event_message(event).unwrap_or_default(),
        ),
    };

    let mut metadata = json!({
        "type": ty,
        "value": value.chars().take(METADATA_VALUE_MAX).collect::<String>(),
    });

    if let Some(frame) = top_frame(event) {
        if let Some(filename) = frame.get("filename").and_then(Value::as_str) {
            metadata["filename"] = json!(filename);
        }
        if let Some(function) = frame.get("function").and_then(Value::as_str) {
            metadata["function"] = json!(function);
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exception_event(ty: &str, value: &str, frames: Value) -> Value {
        json!({
            "event_id": "9ec79c33ec9942ab8353589fcb2e04dc",
            "exception": {"values": [{
                "type": ty,
                "value": value,
                "stacktrace": {"frames": frames}
            }]}
        })
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let event = exception_event(
            "TypeError",
            "Cannot read property 'foo' of undefined",
            json!([{"filename": "app.js", "function": "handleClick", "lineno": 42, "in_app": true}]),
        );
        assert_eq!(fingerprint_event(&event), fingerprint_event(&event));
        assert_eq!(fingerprint_event(&event).len(), FINGERPRINT_HEX_LEN);
    }

    #[test]
    fn key_order_does_not_change_the_fingerprint() {
        let a: Value = serde_json::from_str(
            r#"{"exception":{"values":[{"type":"E","value":"boom"}]},"level":"error"}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"level":"error","exception":{"values":[{"value":"boom","type":"E"}]}}"#,
        )
        .unwrap();
        assert_eq!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn normalized_ids_collapse_to_one_fingerprint() {
        let frames =
            json!([{"filename": "app.js", "function": "load", "lineno": 10, "in_app": true}]);
        let a = exception_event(
            "RequestError",
            "Request abc12345-1234-1234-1234-1234567890ab failed",
            frames.clone(),
        );
        let b = exception_event(
            "RequestError",
            "Request def67890-4321-4321-4321-0987654321fe failed",
            frames,
        );
        assert_eq!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn different_exception_types_do_not_collide() {
        let a = exception_event("TypeError", "boom", json!([]));
        let b = exception_event("RangeError", "boom", json!([]));
        assert_ne!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn explicit_fingerprint_wins_over_exception() {
        let mut a = exception_event("TypeError", "boom", json!([]));
        a["fingerprint"] = json!(["checkout", "payment-failed"]);
        let mut b = exception_event("RangeError", "totally different", json!([]));
        b["fingerprint"] = json!(["checkout", "payment-failed"]);
        assert_eq!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn all_default_tokens_fall_through_to_exception() {
        let mut a = exception_event("TypeError", "boom", json!([]));
        a["fingerprint"] = json!(["{{ default }}"]);
        let b = exception_event("TypeError", "boom", json!([]));
        assert_eq!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn mixed_tokens_including_default_are_hashed_as_given() {
        let mut a = exception_event("TypeError", "boom", json!([]));
        a["fingerprint"] = json!(["{{ default }}", "shard-9"]);
        let plain = exception_event("TypeError", "boom", json!([]));
        assert_ne!(fingerprint_event(&a), fingerprint_event(&plain));
    }

    #[test]
    fn in_app_frames_are_preferred_and_sdk_order_reversed() {
        // Oldest-first SDK order: the library frame is newest
        let mixed = exception_event(
            "E",
            "boom",
            json!([
                {"filename": "app.js", "function": "main", "lineno": 1, "in_app": true},
                {"filename": "vendor.js", "function": "lib", "lineno": 99, "in_app": false},
            ]),
        );
        let in_app_only = exception_event(
            "E",
            "boom",
            json!([
                {"filename": "app.js", "function": "main", "lineno": 1, "in_app": true},
            ]),
        );
        assert_eq!(fingerprint_event(&mixed), fingerprint_event(&in_app_only));
    }

    #[test]
    fn frames_beyond_the_top_three_do_not_matter() {
        let frames = |extra: bool| {
            let mut fs = vec![
                json!({"filename": "d.js", "function": "d", "lineno": 4, "in_app": true}),
                json!({"filename": "c.js", "function": "c", "lineno": 3, "in_app": true}),
                json!({"filename": "b.js", "function": "b", "lineno": 2, "in_app": true}),
                json!({"filename": "a.js", "function": "a", "lineno": 1, "in_app": true}),
            ];
            if extra {
                fs.insert(0, json!({"filename": "z.js", "function": "z", "lineno": 9, "in_app": true}));
            }
            Value::Array(fs)
        };
        let a = exception_event("E", "boom", frames(false));
        let b = exception_event("E", "boom", frames(true));
        assert_eq!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn filename_query_strings_are_stripped() {
        let a = exception_event(
            "E",
            "boom",
            json!([{"filename": "bundle.js?v=123abc", "function": "f", "lineno": 1, "in_app": true}]),
        );
        let b = exception_event(
            "E",
            "boom",
            json!([{"filename": "bundle.js?v=456def", "function": "f", "lineno": 1, "in_app": true}]),
        );
        assert_eq!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn message_events_group_by_level_and_normalized_text() {
        let a = json!({"message": "disk 1234567 full", "level": "warning"});
        let b = json!({"message": "disk 7654321 full", "level": "warning"});
        let c = json!({"message": "disk 1234567 full", "level": "error"});
        assert_eq!(fingerprint_event(&a), fingerprint_event(&b));
        assert_ne!(fingerprint_event(&a), fingerprint_event(&c));
    }

    #[test]
    fn bare_events_fall_back_to_event_id() {
        let a = json!({"event_id": "00000000000000000000000000000001"});
        let b = json!({"event_id": "00000000000000000000000000000002"});
        assert_ne!(fingerprint_event(&a), fingerprint_event(&b));
    }

    #[test]
    fn title_formats_exception_and_truncates() {
        let event = exception_event("TypeError", "Cannot read property 'foo' of undefined", json!([]));
        assert_eq!(
            derive_title(&event),
            "TypeError: Cannot read property 'foo' of undefined"
        );

        let long_value = "v".repeat(150);
        let event = exception_event("E", &long_value, json!([]));
        let title = derive_title(&event);
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), "E: ".len() + 97 + 3);

        assert_eq!(derive_title(&json!({})), "Unknown Error");
    }

    #[test]
    fn culprit_prefers_transaction_then_top_frame() {
        let mut event = exception_event(
            "E",
            "boom",
            json!([{"filename": "app.js", "function": "handleClick", "lineno": 42, "in_app": true}]),
        );
        assert_eq!(
            derive_culprit(&event),
            Some("app.js in handleClick at line 42".to_string())
        );

        event["transaction"] = json!("GET /checkout");
        assert_eq!(derive_culprit(&event), Some("GET /checkout".to_string()));

        assert_eq!(derive_culprit(&json!({"message": "hi"})), None);
    }

    #[test]
    fn culprit_omits_absent_frame_components() {
        let event = exception_event(
            "E",
            "boom",
            json!([{"function": "handleClick", "in_app": true}]),
        );
        assert_eq!(derive_culprit(&event), Some("in handleClick".to_string()));
    }

    #[test]
    fn metadata_mirrors_type_value_and_top_frame() {
        let event = exception_event(
            "TypeError",
            "boom",
            json!([{"filename": "app.js", "function": "handleClick", "lineno": 42, "in_app": true}]),
        );
        let metadata = derive_metadata(&event);
        assert_eq!(metadata["type"], "TypeError");
        assert_eq!(metadata["value"], "boom");
        assert_eq!(metadata["filename"], "app.js");
        assert_eq!(metadata["function"], "handleClick");
    }

    #[test]
    fn level_defaults_to_error_on_junk() {
        assert_eq!(resolve_level(&json!({"level": "warning"})), IssueLevel::Warning);
        assert_eq!(resolve_level(&json!({"level": "catastrophic"})), IssueLevel::Error);
        assert_eq!(resolve_level(&json!({})), IssueLevel::Error);
    }
}
