//! `LoggerPort` bridged onto `tracing`.
//!
//! Events keep their stable name in the `event` field; fields and errors are
//! rendered as compact JSON so any subscriber (fmt, json) can carry them.

use polychat_ports::{LogEvent, LogFields, LogLevel, LoggerPort};
use polychat_shared::{REDACTED, is_secret_key};
use serde_json::Value;

/// Forwards structured events to the active `tracing` subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    base_fields: LogFields,
}

impl TracingLogger {
    /// Logger with no base fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoggerPort for TracingLogger {
    fn log(&self, event: LogEvent) {
        let mut fields = self.base_fields.clone();
        fields.extend(event.fields.unwrap_or_default());
        let fields = render_fields(&fields);
        let error = event.error.map(|value| value.to_string());
        let name = event.event.as_ref();
        let message = event.message.as_ref();

        match event.level {
            LogLevel::Debug => {
                tracing::debug!(
                    event = name,
                    fields = fields.as_deref(),
                    error = error.as_deref(),
                    "{message}"
                );
            },
            LogLevel::Info => {
                tracing::info!(
                    event = name,
                    fields = fields.as_deref(),
                    error = error.as_deref(),
                    "{message}"
                );
            },
            LogLevel::Warn => {
                tracing::warn!(
                    event = name,
                    fields = fields.as_deref(),
                    error = error.as_deref(),
                    "{message}"
                );
            },
            LogLevel::Error => {
                tracing::error!(
                    event = name,
                    fields = fields.as_deref(),
                    error = error.as_deref(),
                    "{message}"
                );
            },
        }
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut base_fields = self.base_fields.clone();
        base_fields.extend(fields);
        Box::new(Self { base_fields })
    }
}

fn render_fields(fields: &LogFields) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    let object: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(key, value)| {
            let value = if is_secret_key(key) {
                Value::String(REDACTED.to_string())
            } else {
                value.clone()
            };
            (key.to_string(), value)
        })
        .collect();
    Some(Value::Object(object).to_string())
}
