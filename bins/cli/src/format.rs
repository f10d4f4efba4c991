//! Output format helpers for CLI commands.

use crate::error::CliError;
use clap::{Args, ValueEnum};
use serde_json::{Map, Value};

/// Output format choices for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-friendly text output.
    Text,
    /// Machine-friendly JSON output.
    Json,
    /// Line-delimited JSON (NDJSON) output.
    Ndjson,
}

/// Output-related CLI flags.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output format for command responses.
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,
    /// Emit machine-friendly defaults (NDJSON output, no progress).
    #[arg(long, global = true)]
    pub agent: bool,
    /// Suppress progress/logging output.
    #[arg(long, global = true)]
    pub no_progress: bool,
    /// Emit machine-readable JSON output (alias for `--output json`).
    #[arg(long, global = true, hide = true)]
    pub json: bool,
}

/// Output mode derived from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub format: OutputFormat,
    pub no_progress: bool,
}

impl OutputMode {
    /// Build output mode from CLI flags.
    #[must_use]
    pub const fn from_args(args: &OutputArgs) -> Self {
        let format = match (args.output, args.json, args.agent) {
            (Some(value), _, _) => value,
            (None, true, _) => OutputFormat::Json,
            (None, false, true) => OutputFormat::Ndjson,
            (None, false, false) => OutputFormat::Text,
        };

        Self {
            format,
            no_progress: args.agent || args.no_progress,
        }
    }

    /// Quiet text mode, used by unit tests.
    #[cfg(test)]
    #[must_use]
    pub const fn quiet(format: OutputFormat) -> Self {
        Self {
            format,
            no_progress: true,
        }
    }

    /// Returns true when JSON output is requested.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Returns true when NDJSON output is requested.
    #[must_use]
    pub const fn is_ndjson(self) -> bool {
        matches!(self.format, OutputFormat::Ndjson)
    }

    /// Render a successful payload.
    ///
    /// JSON output is pretty-printed with `"status": "ok"` first; NDJSON is
    /// one summary line tagged with `kind`; text output comes from `text`.
    pub fn render_ok(
        self,
        kind: &str,
        payload: Map<String, Value>,
        text: impl FnOnce() -> String,
    ) -> Result<String, CliError> {
        self.render("ok", kind, payload, text)
    }

    /// Render a payload with an explicit status label.
    pub fn render(
        self,
        status: &str,
        kind: &str,
        payload: Map<String, Value>,
        text: impl FnOnce() -> String,
    ) -> Result<String, CliError> {
        let mut out = match self.format {
            OutputFormat::Text => return Ok(text()),
            OutputFormat::Json => {
                let mut object = Map::new();
                object.insert("status".to_string(), Value::from(status));
                object.extend(payload);
                serde_json::to_string_pretty(&Value::Object(object))?
            },
            OutputFormat::Ndjson => {
                let mut object = Map::new();
                object.insert("type".to_string(), Value::from("summary"));
                object.insert("status".to_string(), Value::from(status));
                object.insert("kind".to_string(), Value::from(kind));
                object.extend(payload);
                serde_json::to_string(&Value::Object(object))?
            },
        };
        out.push('\n');
        Ok(out)
    }
}
