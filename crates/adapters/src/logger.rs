//! Structured JSON logger adapter.

use crate::log_sink::LogSink;
use polychat_ports::{LogEvent, LogFields, LogLevel, LoggerPort};
use polychat_shared::{REDACTED, is_secret_key};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const SERIALIZE_FAILED_LINE: &str = "{\"timestampMs\":0,\"level\":\"error\",\"event\":\"logger.serialize_failed\",\"message\":\"log serialization failed\"}\n";

/// JSON logger emitting one line per event.
///
/// Field and error keys that look like credentials are replaced with
/// `[REDACTED]` at any depth.
#[derive(Clone)]
pub struct JsonLogger {
    sink: Arc<dyn LogSink>,
    base_fields: LogFields,
    min_level: LogLevel,
}

impl JsonLogger {
    /// Create a JSON logger backed by the provided sink.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_fields: LogFields::new(),
            min_level: LogLevel::Info,
        }
    }

    /// Set base fields applied to every event.
    #[must_use]
    pub fn with_base_fields(mut self, fields: LogFields) -> Self {
        self.base_fields = fields;
        self
    }

    /// Set the minimum log level.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    fn render(&self, event: LogEvent) -> String {
        let mut fields = self.base_fields.clone();
        fields.extend(event.fields.unwrap_or_default());

        let mut payload = Map::new();
        payload.insert("timestampMs".to_string(), Value::from(now_epoch_ms()));
        payload.insert("level".to_string(), Value::from(event.level.as_str()));
        payload.insert("event".to_string(), Value::from(event.event.as_ref()));
        payload.insert("message".to_string(), Value::from(event.message.as_ref()));
        if !fields.is_empty() {
            let mut object: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| (key.into_string(), value))
                .collect();
            redact_object(&mut object);
            payload.insert("fields".to_string(), Value::Object(object));
        }
        if let Some(mut error) = event.error {
            redact_value(&mut error);
            payload.insert("error".to_string(), error);
        }

        serde_json::to_string(&Value::Object(payload)).map_or_else(
            |_| SERIALIZE_FAILED_LINE.to_string(),
            |mut encoded| {
                encoded.push('\n');
                encoded
            },
        )
    }
}

impl LoggerPort for JsonLogger {
    fn log(&self, event: LogEvent) {
        if event.level < self.min_level {
            return;
        }
        let line = self.render(event);
        self.sink.write_line(&line);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut merged = self.base_fields.clone();
        merged.extend(fields);
        Box::new(Self {
            sink: Arc::clone(&self.sink),
            base_fields: merged,
            min_level: self.min_level,
        })
    }
}

fn redact_object(map: &mut Map<String, Value>) {
    for (key, nested) in map.iter_mut() {
        if is_secret_key(key) {
            *nested = Value::String(REDACTED.to_string());
        } else {
            redact_value(nested);
        }
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => redact_object(map),
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {},
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;
    use polychat_ports::log_fields;
    use polychat_shared::{ErrorCode, ErrorEnvelope};
    use serde_json::json;

    #[test]
    fn credentials_are_redacted_at_any_depth() {
        let sink = Arc::new(MemoryLogSink::default());
        let logger = JsonLogger::new(sink.clone());

        logger.log(LogEvent {
            event: "chat.send.failed".into(),
            level: LogLevel::Warn,
            message: "provider rejected the request".into(),
            fields: Some(log_fields([
                ("provider", json!("anthropic")),
                ("apiKey", json!("sk-ant-live")), // pragma: allowlist secret
                ("request", json!({ "headers": { "authorization": "Bearer x" } })),
            ])),
            error: Some(json!({ "metadata": { "token": "abc", "status": "401" } })),
        });

        let lines = sink.take_json();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["level"], "warn");
        assert_eq!(line["fields"]["provider"], "anthropic");
        assert_eq!(line["fields"]["apiKey"], REDACTED);
        assert_eq!(line["fields"]["request"]["headers"]["authorization"], REDACTED);
        assert_eq!(line["error"]["metadata"]["token"], REDACTED);
        assert_eq!(line["error"]["metadata"]["status"], "401");
    }

    #[test]
    fn events_below_min_level_are_dropped() {
        let sink = Arc::new(MemoryLogSink::default());
        let logger = JsonLogger::new(sink.clone());

        logger.debug("config.load.cache_miss", "no cached document", None);
        logger.info("config.load.selected", "using bundled", None);

        let lines = sink.take_json();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["event"], "config.load.selected");
    }

    #[test]
    fn child_logger_merges_fields_and_event_fields_win() {
        let sink = Arc::new(MemoryLogSink::default());
        let logger = JsonLogger::new(sink.clone())
            .with_min_level(LogLevel::Debug)
            .with_base_fields(log_fields([("component", json!("loader"))]));

        let child = logger.child(log_fields([
            ("domain", json!("topics")),
            ("component", json!("refresh")),
        ]));
        child.debug(
            "config.refresh.start",
            "refreshing",
            Some(log_fields([("domain", json!("modes"))])),
        );

        let lines = sink.take_json();
        assert_eq!(lines[0]["fields"]["component"], "refresh");
        assert_eq!(lines[0]["fields"]["domain"], "modes");
    }

    #[test]
    fn warn_error_serializes_the_envelope() {
        let sink = Arc::new(MemoryLogSink::default());
        let logger = JsonLogger::new(sink.clone());
        let error = ErrorEnvelope::expected(ErrorCode::not_found(), "cache miss");

        logger.warn_error("config.cache.read_failed", &error, None);

        let lines = sink.take_json();
        assert_eq!(lines[0]["message"], "cache miss");
        assert_eq!(lines[0]["error"]["code"]["code"], "not_found");
    }
}
