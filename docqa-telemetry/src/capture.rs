use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// Field that correlates events with one uploaded document.
pub const DOCUMENT_ID_FIELD: &str = "document.id";

/// A log event recorded by [`CaptureLayer`].
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: String,
    pub target: String,
    /// The event's `message` field, empty if it had none.
    pub message: String,
    /// Event fields merged over the fields of its enclosing spans.
    pub fields: HashMap<String, serde_json::Value>,
}

impl CapturedEvent {
    /// The document id this event belongs to, if any.
    pub fn document_id(&self) -> Option<&str> {
        self.fields.get(DOCUMENT_ID_FIELD).and_then(|v| v.as_str())
    }
}

/// Shared storage for captured events
#[derive(Debug, Clone, Default)]
pub struct EventCapture {
    events: Arc<RwLock<Vec<CapturedEvent>>>,
}

impl EventCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event captured so far, oldest first.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.read().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events carrying `document.id == document_id`, directly or through a span.
    pub fn events_for(&self, document_id: &str) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.document_id() == Some(document_id)).collect()
    }

    /// Events whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.message == message).collect()
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// A tracing layer that records events in memory
pub struct CaptureLayer {
    capture: EventCapture,
}

impl CaptureLayer {
    pub fn new(capture: EventCapture) -> Self {
        Self { capture }
    }
}

#[derive(Clone)]
struct SpanFields(HashMap<String, serde_json::Value>);

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.0;

        // Inherit fields from the parent span unless overridden here
        if let Some(parent) = span.parent() {
            if let Some(parent_fields) = parent.extensions().get::<SpanFields>() {
                for (key, value) in &parent_fields.0 {
                    fields.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }

        span.extensions_mut().insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let mut fields = ctx
            .event_span(event)
            .and_then(|span| span.extensions().get::<SpanFields>().map(|f| f.0.clone()))
            .unwrap_or_default();

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        fields.extend(visitor.0);

        let message = match fields.remove("message") {
            Some(serde_json::Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let metadata = event.metadata();
        self.capture.push(CapturedEvent {
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn events_inherit_span_fields() {
        let capture = EventCapture::new();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(capture.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("upload", document.id = "doc-1");
            let _guard = span.enter();
            tracing::info!(chunk_count = 3u64, "document uploaded");
        });

        let events = capture.events_for("doc-1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "document uploaded");
        assert_eq!(events[0].level, "INFO");
        assert_eq!(events[0].fields["chunk_count"], serde_json::json!(3));
    }

    #[test]
    fn event_fields_override_span_fields() {
        let capture = EventCapture::new();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(capture.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let outer = tracing::info_span!("request", document.id = "outer");
            let _outer = outer.enter();
            tracing::warn!(document.id = "inner", "batch failed");
            tracing::info!("no document here");
        });

        assert_eq!(capture.events_for("inner").len(), 1);
        assert_eq!(capture.events_for("outer").len(), 1);
        assert_eq!(capture.with_message("batch failed")[0].level, "WARN");
    }

    #[test]
    fn nested_spans_propagate_document_id() {
        let capture = EventCapture::new();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(capture.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let outer = tracing::info_span!("upload", document.id = "doc-9");
            let _outer = outer.enter();
            let inner = tracing::debug_span!("index_batch", batch = 0u64);
            let _inner = inner.enter();
            tracing::debug!("batch stored");
        });

        let events = capture.events_for("doc-9");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fields["batch"], serde_json::json!(0));
    }
}
