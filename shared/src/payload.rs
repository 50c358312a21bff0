//! Invocation payload resolution.
//!
//! Runtimes hand the caller's JSON over in different ways: as a structured
//! event, wrapped in `body`/`payload`/`data`, as a JSON string (sometimes
//! encoded twice), as a form-encoded body, through an environment variable or
//! on stdin. [`PayloadResolver`] tries an ordered list of [`PayloadSource`]s
//! and normalizes whatever the first useful one yields into a JSON object.

use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::debug;

/// Keys under which runtimes nest the actual payload.
const WRAPPER_KEYS: [&str; 5] = ["body", "payload", "data", "req", "context"];

/// Keys that mark an object as the request itself rather than a wrapper.
const REQUEST_KEYS: [&str; 4] = ["profileId", "accountId", "profile_id", "account_id"];

/// Form fields that may carry an encoded payload.
const FORM_KEYS: [&str; 3] = ["body", "payload", "data"];

/// Nesting limit for wrappers and re-encoded strings.
const MAX_DEPTH: usize = 8;

/// A place the invocation payload may come from.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Raw payload, `None` when this source has nothing.
    async fn read(&self) -> Option<Value>;
}

/// Structured payload handed over by the invoking runtime.
pub struct EventSource(pub Value);

#[async_trait]
impl PayloadSource for EventSource {
    fn name(&self) -> &str {
        "event"
    }

    async fn read(&self) -> Option<Value> {
        match &self.0 {
            Value::Null => None,
            value => Some(value.clone()),
        }
    }
}

/// JSON text stored in an environment variable.
pub struct EnvVarSource {
    var: String,
}

impl EnvVarSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl PayloadSource for EnvVarSource {
    fn name(&self) -> &str {
        &self.var
    }

    async fn read(&self) -> Option<Value> {
        std::env::var(&self.var).ok().map(Value::String)
    }
}

/// A blocking byte stream read on its own thread, abandoned after `timeout`.
///
/// The reader thread is detached so a stream that never reaches EOF cannot
/// keep the process alive.
pub struct StreamSource {
    name: &'static str,
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    timeout: Duration,
}

impl StreamSource {
    pub fn new(name: &'static str, reader: impl Read + Send + 'static, timeout: Duration) -> Self {
        Self {
            name,
            reader: Mutex::new(Some(Box::new(reader))),
            timeout,
        }
    }

    /// Process stdin.
    pub fn stdin(timeout: Duration) -> Self {
        Self::new("stdin", std::io::stdin(), timeout)
    }
}

#[async_trait]
impl PayloadSource for StreamSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn read(&self) -> Option<Value> {
        let mut reader = self.reader.lock().ok()?.take()?;
        let (tx, rx) = oneshot::channel();

        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = tx.send(reader.read_to_string(&mut buf).map(|_| buf));
        });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(text))) => Some(Value::String(text)),
            Ok(Ok(Err(e))) => {
                debug!(source = self.name, "Stream read failed: {}", e);
                None
            }
            Ok(Err(_)) => None,
            Err(_) => {
                debug!(source = self.name, "No input within {:?}", self.timeout);
                None
            }
        }
    }
}

/// Source backed by a closure, for conventions without a dedicated type.
pub struct FnSource<F> {
    name: &'static str,
    read: F,
}

impl<F> FnSource<F>
where
    F: Fn() -> Option<Value> + Send + Sync,
{
    pub fn new(name: &'static str, read: F) -> Self {
        Self { name, read }
    }
}

#[async_trait]
impl<F> PayloadSource for FnSource<F>
where
    F: Fn() -> Option<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn read(&self) -> Option<Value> {
        (self.read)()
    }
}

/// Ordered list of payload sources.
#[derive(Default)]
pub struct PayloadResolver {
    sources: Vec<Box<dyn PayloadSource>>,
}

impl PayloadResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source; sources are tried in insertion order.
    pub fn with_source(mut self, source: impl PayloadSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// First non-empty payload object, or an empty map when nothing yields one.
    pub async fn resolve(&self) -> Map<String, Value> {
        for source in &self.sources {
            match source.read().await.and_then(normalize) {
                Some(payload) if !payload.is_empty() => {
                    debug!(source = source.name(), "Resolved payload");
                    return payload;
                }
                _ => debug!(source = source.name(), "No payload from source"),
            }
        }
        Map::new()
    }
}

/// Normalize a raw payload value into the request object.
pub fn normalize(value: Value) -> Option<Map<String, Value>> {
    normalize_at(value, 0)
}

/// Decode payload text: JSON, JSON-in-a-JSON-string, or form encoding.
pub fn decode_text(text: &str) -> Option<Map<String, Value>> {
    decode_text_at(text, 0)
}

fn normalize_at(value: Value, depth: usize) -> Option<Map<String, Value>> {
    if depth > MAX_DEPTH {
        return None;
    }

    match value {
        Value::String(text) => decode_text_at(&text, depth + 1),
        Value::Object(map) if is_wrapper(&map) => WRAPPER_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|inner| normalize_at(inner.clone(), depth + 1).filter(|m| !m.is_empty())),
        Value::Object(map) if map.is_empty() => None,
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn is_wrapper(map: &Map<String, Value>) -> bool {
    !REQUEST_KEYS.iter().any(|k| map.contains_key(*k))
        && WRAPPER_KEYS.iter().any(|k| map.contains_key(*k))
}

fn decode_text_at(text: &str, depth: usize) -> Option<Map<String, Value>> {
    if depth > MAX_DEPTH {
        return None;
    }

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return normalize_at(value, depth);
    }

    form_payload(text).and_then(|inner| decode_text_at(&inner, depth + 1))
}

/// Pull the encoded JSON out of form-encoded text.
fn form_payload(text: &str) -> Option<String> {
    if text.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("%7B")) {
        return percent_decode(text);
    }

    let fields: Vec<(String, &str)> = text
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter_map(|(k, v)| percent_decode(k).map(|k| (k, v)))
        .collect();

    FORM_KEYS.iter().find_map(|wanted| {
        fields
            .iter()
            .find(|(key, _)| key == wanted)
            .and_then(|(_, value)| percent_decode(value))
    })
}

fn percent_decode(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|s| s.into_owned())
}
