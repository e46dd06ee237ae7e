//! Log records that are mirrored to the backend.
//!
//! [`LogSink`] is the logging interface the rest of the crate writes to.
//! [`TracingSink`] is the local behaviour. [`RemoteLogger`] decorates another
//! sink: every record goes to the inner sink first and is then POSTed to
//! `/api/logs/` from a spawned task.
//!
//! Shipping goes through [`ApiClient`] directly, which only ever logs via
//! `tracing`, never through a [`LogSink`]. A failed shipment is reported on the
//! `qlab::logging::fallback` target and dropped.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use qlab_common::http_client::HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::client::ApiClient;
use crate::endpoints::LogEntry;

/// Severity of a log record, named as the backend expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// `DEBUG`
    Debug,
    /// `INFO`
    Info,
    /// `WARNING`
    Warning,
    /// `ERROR`
    Error,
    /// `CRITICAL`
    Critical,
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Record `message` at `level` with structured `meta`.
    fn log(&self, level: LogLevel, message: &str, meta: &Value);
}

/// Writes records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, meta: &Value) {
        match level {
            LogLevel::Debug => tracing::debug!(%meta, "{message}"),
            LogLevel::Info => tracing::info!(%meta, "{message}"),
            LogLevel::Warning => tracing::warn!(%meta, "{message}"),
            LogLevel::Error | LogLevel::Critical => tracing::error!(%meta, "{message}"),
        }
    }
}

/// Normalise `meta` to the JSON object the collector accepts.
///
/// `null` becomes `{}`; any other non-object is wrapped as `{"args": meta}`.
pub fn meta_object(meta: Value) -> Map<String, Value> {
    match meta {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("args".into(), other);
            map
        }
    }
}

/// Sink decorator that ships every record to the backend after logging it locally.
pub struct RemoteLogger<L, T> {
    inner: L,
    client: Arc<ApiClient<T>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<L, T> RemoteLogger<L, T>
where
    L: LogSink,
    T: HttpClient + Send + Sync + 'static,
{
    /// Wrap `inner`, shipping through `client`.
    pub fn new(inner: L, client: Arc<ApiClient<T>>) -> Self {
        Self {
            inner,
            client,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Log locally, then ship in the background. Must be called inside a tokio runtime.
    ///
    /// The returned handle resolves once the shipment finished or failed; it
    /// never carries an error.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>, meta: Value) -> JoinHandle<()> {
        let message = message.into();
        self.inner.log(level, &message, &meta);
        let entry = LogEntry {
            level,
            message,
            meta: meta_object(meta),
            timestamp: Utc::now(),
        };
        tokio::spawn(ship(self.client.clone(), entry))
    }

    /// `DEBUG` record.
    pub fn debug(&self, message: impl Into<String>, meta: Value) -> JoinHandle<()> {
        self.emit(LogLevel::Debug, message, meta)
    }

    /// `INFO` record.
    pub fn info(&self, message: impl Into<String>, meta: Value) -> JoinHandle<()> {
        self.emit(LogLevel::Info, message, meta)
    }

    /// `WARNING` record.
    pub fn warn(&self, message: impl Into<String>, meta: Value) -> JoinHandle<()> {
        self.emit(LogLevel::Warning, message, meta)
    }

    /// `ERROR` record.
    pub fn error(&self, message: impl Into<String>, meta: Value) -> JoinHandle<()> {
        self.emit(LogLevel::Error, message, meta)
    }

    /// Wait for every shipment started through [`LogSink::log`].
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::warn!(
                    target: "qlab::logging::fallback",
                    error = %e,
                    "log shipment task failed"
                );
            }
        }
    }
}

impl<L, T> LogSink for RemoteLogger<L, T>
where
    L: LogSink,
    T: HttpClient + Send + Sync + 'static,
{
    fn log(&self, level: LogLevel, message: &str, meta: &Value) {
        let handle = self.emit(level, message, meta.clone());
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

async fn ship<T>(client: Arc<ApiClient<T>>, entry: LogEntry)
where
    T: HttpClient + Send + Sync + 'static,
{
    if let Err(e) = client.send_anonymous(&entry).await {
        tracing::warn!(
            target: "qlab::logging::fallback",
            log_level = ?entry.level,
            record = %entry.message,
            error = %e,
            "failed to send log"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meta_is_always_an_object() {
        assert!(meta_object(Value::Null).is_empty());
        assert_eq!(meta_object(json!({"a": 1}))["a"], 1);
        assert_eq!(meta_object(json!(["x", 2]))["args"], json!(["x", 2]));
    }

    #[test]
    fn levels_serialize_like_the_collector_expects() {
        assert_eq!(serde_json::to_value(LogLevel::Warning).unwrap(), "WARNING");
        assert_eq!(serde_json::to_value(LogLevel::Critical).unwrap(), "CRITICAL");
        assert_eq!(
            serde_json::from_value::<LogLevel>(json!("DEBUG")).unwrap(),
            LogLevel::Debug
        );
    }
}
