use async_trait::async_trait;
use serde_json::Value;

/// Best-effort structured event log. Failures must never fail the
/// caller — the core only ever logs a warning and continues.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, kind: &str, fields: Value);
}

/// Logs through `tracing` at info level. The default sink used when no
/// richer one (e.g. a durable event table) is configured.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn record(&self, kind: &str, fields: Value) {
        tracing::info!(event.kind = kind, event.fields = %fields, "lobby event");
    }
}
