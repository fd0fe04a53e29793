//! Tracing layer that streams round lifecycle events to a front-end.
//!
//! The orchestrator emits `chorus::round` events (`round_started`,
//! `speaker_started`, `speaker_finished`, `round_finished`, `round_empty`).
//! [`RoundEventLayer`] captures them with their structured fields and sends
//! them down an unbounded tokio channel.

use chorus_application::ROUND_EVENT_TARGET;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A captured round event.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoundEvent {
    /// Log level (INFO, DEBUG, WARN, ERROR)
    pub level: String,
    /// Human-readable message
    pub message: String,
    /// Structured fields, `message` excluded
    pub fields: HashMap<String, Value>,
    pub timestamp: String,
}

impl RoundEvent {
    /// The `event` field, e.g. `round_started`.
    pub fn kind(&self) -> Option<&str> {
        self.field_str("event")
    }

    /// A string-valued field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Whether `metadata` belongs to a round event.
///
/// Used as the per-layer filter of [`RoundEventLayer`].
pub fn is_round_event(metadata: &Metadata<'_>) -> bool {
    metadata.target() == ROUND_EVENT_TARGET
}

/// Sends every event it sees to a channel.
///
/// Install it behind a [`is_round_event`] filter so that only round events
/// reach it.
pub struct RoundEventLayer {
    sender: mpsc::UnboundedSender<RoundEvent>,
}

impl RoundEventLayer {
    pub fn new(sender: mpsc::UnboundedSender<RoundEvent>) -> Self {
        Self { sender }
    }

    /// A layer plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RoundEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl<S> Layer<S> for RoundEventLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        let message = match fields.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let round_event = RoundEvent {
            level: event.metadata().level().to_string(),
            message,
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // A dropped receiver only means nobody is listening any more.
        let _ = self.sender.send(round_event);
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(format!("{:?}", value)));
    }
}
