//! Process exit codes and the CLI-local error type.

use polychat_shared::{ErrorClass, ErrorEnvelope, ErrorKind};
use std::fmt;

/// Process exit codes.
///
/// Scripts branch on these, so the numeric values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    /// Provider rejected the call, or something broke internally.
    Failure = 1,
    /// Bad flags, settings, or documents supplied by the caller.
    Usage = 2,
    /// Timeout or network failure; running the same command again may work.
    Transient = 3,
}

impl ExitCode {
    /// Exit code for a structured error.
    #[must_use]
    pub const fn for_envelope(error: &ErrorEnvelope) -> Self {
        match (error.kind, error.class) {
            (ErrorKind::Expected, _) => Self::Usage,
            (ErrorKind::Unexpected, ErrorClass::Retriable) => Self::Transient,
            (ErrorKind::Unexpected | ErrorKind::Invariant, _) => Self::Failure,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Failures that abort a command before it can render structured output.
#[derive(Debug)]
pub enum CliError {
    /// Writing to stdout or stderr failed.
    Output(std::io::Error),
    Serialization(serde_json::Error),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
}

impl CliError {
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Output(_) => ExitCode::Transient,
            Self::Serialization(_) | Self::Runtime(_) => ExitCode::Failure,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(error) => write!(formatter, "cannot write output: {error}"),
            Self::Serialization(error) => write!(formatter, "cannot encode output: {error}"),
            Self::Runtime(error) => write!(formatter, "async runtime unavailable: {error}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Output(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}
