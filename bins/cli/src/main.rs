//! CLI binary entrypoint.

mod commands;
mod error;
mod format;

use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::{
    ChatSendInput, run_chat_send, run_config_check, run_config_schema, run_config_show, run_info,
    run_settings_check, run_settings_show,
};
use error::{CliError, ExitCode};
use format::{OutputArgs, OutputMode};
use polychat_config::ValidatedClientSettings;
use polychat_domain::ConfigDomain;
use polychat_infra::{ErrorReport, InfraError, InfraResult, load_effective_settings};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Once;

/// Prefix of every environment variable the CLI reads settings from.
const ENV_PREFIX: &str = "POLYCHAT_";
/// Tracing filter directive variable (`RUST_LOG` syntax).
const LOG_ENV: &str = "POLYCHAT_LOG";

static TRACING_INIT: Once = Once::new();

#[derive(Debug, Parser)]
#[command(
    name = "polychat",
    version,
    about = "Multi-provider chat client with remotely refreshable configuration",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Where client settings come from.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Settings file (JSON/TOML).
    #[arg(long = "settings", global = true, value_name = "PATH")]
    pub path: Option<PathBuf>,
    /// JSON overrides applied on top of the settings file (partial settings).
    #[arg(long, global = true, value_name = "JSON")]
    pub overrides_json: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show build and version details.
    Info,
    /// Remotely refreshable config documents.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Local client settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Chat with a configured provider.
    Chat {
        #[command(subcommand)]
        command: ChatCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Show the document currently selected for a domain.
    Show {
        /// Config domain.
        #[arg(value_enum)]
        domain: DomainArg,
        /// Fetch the remote document first and wait for the result.
        #[arg(long)]
        refresh: bool,
        /// Print the full document instead of a summary.
        #[arg(long)]
        document: bool,
    },
    /// Validate a document file against a domain schema.
    Check {
        /// Document file (JSON).
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Domain to validate against.
        #[arg(long, value_enum)]
        domain: DomainArg,
    },
    /// Print a JSON schema.
    Schema {
        /// Which schema to print.
        #[arg(long, value_enum, default_value_t = SchemaKind::Settings)]
        kind: SchemaKind,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsCommands {
    /// Show the effective settings after applying overrides.
    Show,
    /// Validate settings loading and overrides.
    Check,
}

#[derive(Debug, Subcommand)]
enum ChatCommands {
    /// Send one message and print the reply.
    Send {
        /// Provider id from the catalog.
        #[arg(long)]
        provider: String,
        /// Message text.
        #[arg(long)]
        message: String,
        /// Model override.
        #[arg(long)]
        model: Option<String>,
        /// System prompt.
        #[arg(long)]
        system: Option<String>,
        /// Endpoint override.
        #[arg(long)]
        endpoint: Option<String>,
        /// Completion token cap.
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Sampling temperature.
        #[arg(long)]
        temperature: Option<f32>,
        /// Environment variable holding the provider credential.
        #[arg(long, default_value = "POLYCHAT_API_KEY")]
        api_key_env: String,
    },
}

/// Config domain selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DomainArg {
    Providers,
    Topics,
    Modes,
}

impl From<DomainArg> for ConfigDomain {
    fn from(value: DomainArg) -> Self {
        match value {
            DomainArg::Providers => Self::Providers,
            DomainArg::Topics => Self::Topics,
            DomainArg::Modes => Self::Modes,
        }
    }
}

/// Schema selector for `config schema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaKind {
    /// Client settings file.
    Settings,
    /// `chat send` request payload.
    ChatRequest,
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

impl CliOutput {
    pub(crate) const fn ok(stdout: String, stderr: String) -> Self {
        Self {
            stdout,
            stderr,
            exit_code: ExitCode::Ok,
        }
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);
    init_tracing();
    tracing::debug!(format = ?mode.format, "polychat starting");

    match run(&cli.command, &cli.settings, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_target(false)
            .with_ansi(false)
            .with_env_filter(filter)
            .try_init();
    });
}

fn run(command: &Commands, settings: &SettingsArgs, mode: OutputMode) -> Result<CliOutput, CliError> {
    match command {
        Commands::Info => run_info(mode),
        Commands::Config { command } => match command {
            ConfigCommands::Show {
                domain,
                refresh,
                document,
            } => run_config_show(mode, settings, (*domain).into(), *refresh, *document),
            ConfigCommands::Check { path, domain } => {
                run_config_check(mode, path, (*domain).into())
            },
            ConfigCommands::Schema { kind } => run_config_schema(mode, *kind),
        },
        Commands::Settings { command } => {
            let env = collect_scoped_env(ENV_PREFIX);
            match command {
                SettingsCommands::Show => run_settings_show(mode, &env, settings),
                SettingsCommands::Check => run_settings_check(mode, &env, settings),
            }
        },
        Commands::Chat { command } => match command {
            ChatCommands::Send {
                provider,
                message,
                model,
                system,
                endpoint,
                max_tokens,
                temperature,
                api_key_env,
            } => run_chat_send(
                mode,
                settings,
                &ChatSendInput {
                    provider,
                    message,
                    model: model.as_deref(),
                    system: system.as_deref(),
                    endpoint: endpoint.as_deref(),
                    max_tokens: *max_tokens,
                    temperature: *temperature,
                    api_key_env,
                },
            ),
        },
    }
}

/// Load settings from the process environment and the global settings flags.
pub(crate) fn load_settings(args: &SettingsArgs) -> InfraResult<ValidatedClientSettings> {
    let env = collect_scoped_env(ENV_PREFIX);
    load_effective_settings(&env, args.path.as_deref(), args.overrides_json.as_deref())
}

/// Start a current-thread runtime for one async command.
pub(crate) fn async_runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

pub(crate) fn format_error_output(mode: OutputMode, error: &InfraError) -> CliOutput {
    let report = ErrorReport::from_envelope(error);

    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);

    let stdout = if mode.is_ndjson() {
        format_ndjson_error(&report)
    } else if mode.is_json() {
        let payload = serde_json::json!({
            "status": "error",
            "error": report,
        });

        // This is a CLI boundary, so JSON serialization errors are internal.
        let mut output = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"ERR_CORE_INTERNAL\",\"message\":\"internal error\",\"kind\":\"invariant\"}}".to_string()
        });
        output.push('\n');
        output
    } else {
        format_error_text(&report)
    };

    CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::for_envelope(error),
    }
}

fn format_error_text(error: &ErrorReport) -> String {
    let mut out = String::new();
    out.push_str("status: error\n");
    out.push_str("code: ");
    out.push_str(&error.code);
    out.push('\n');
    out.push_str("message: ");
    out.push_str(&error.message);
    out.push('\n');
    out.push_str("kind: ");
    out.push_str(&error.kind);
    out.push('\n');
    out.push_str("retriable: ");
    out.push_str(if error.retriable { "true" } else { "false" });
    out.push('\n');

    if !error.meta.is_empty() {
        out.push_str("meta:\n");
        for (key, value) in &error.meta {
            out.push_str("  ");
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
    }

    out
}

pub(crate) fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

fn format_ndjson_error(error: &ErrorReport) -> String {
    let payload = serde_json::json!({
        "type": "error",
        "status": "error",
        "error": error,
    });
    let mut out = serde_json::to_string(&payload).unwrap_or_else(|_| {
        "{\"type\":\"error\",\"status\":\"error\",\"error\":{\"code\":\"ERR_CORE_INTERNAL\",\"message\":\"internal error\",\"kind\":\"invariant\"}}".to_string()
    });
    out.push('\n');
    out
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix) && key != LOG_ENV)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;
    use clap::CommandFactory;
    use polychat_domain::ApiError;
    use polychat_shared::ErrorCode;

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["cli", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );

        assert!(is_version, "expected clap to render version");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_codes_for_errors() -> Result<(), Box<dyn std::error::Error>> {
        let io_error = CliError::Output(io::Error::other("broken pipe"));
        let serialization_error = match serde_json::from_str::<serde_json::Value>("not-json") {
            Ok(_) => return Err("expected serialization error".into()),
            Err(error) => CliError::Serialization(error),
        };

        assert_eq!(io_error.exit_code(), ExitCode::Transient);
        assert_eq!(serialization_error.exit_code(), ExitCode::Failure);
        Ok(())
    }

    #[test]
    fn envelope_exit_codes_follow_kind_and_class() {
        let invalid = InfraError::expected(ErrorCode::invalid_input(), "bad");
        assert_eq!(ExitCode::for_envelope(&invalid), ExitCode::Usage);

        let provider = polychat_domain::ProviderId::parse("openai").expect("provider id");
        let timeout: InfraError = ApiError::timeout(&provider, 10).into();
        assert_eq!(ExitCode::for_envelope(&timeout), ExitCode::Transient);

        let unauthorized: InfraError = ApiError::http_status(&provider, 401, "denied").into();
        assert_eq!(ExitCode::for_envelope(&unauthorized), ExitCode::Failure);
    }

    #[test]
    fn error_formatting_redacts_sensitive_meta_keys() {
        let error = InfraError::expected(ErrorCode::new("config", "invalid_env_url"), "bad env")
            .with_metadata("apiKey", "secret-value") // pragma: allowlist secret
            .with_metadata("field", "timeoutMs");

        let output = format_error_output(OutputMode::quiet(OutputFormat::Text), &error);
        assert!(output.stdout.contains("code: ERR_CONFIG_INVALID_ENV_URL"));
        assert!(output.stdout.contains("apiKey: <redacted>"));
        assert!(!output.stdout.contains("secret-value"));
        assert!(output.stdout.contains("field: timeoutMs"));
    }

    #[test]
    fn json_errors_carry_status_and_code() -> Result<(), Box<dyn std::error::Error>> {
        let error = InfraError::expected(ErrorCode::invalid_input(), "nope");
        let output = format_error_output(OutputMode::quiet(OutputFormat::Json), &error);
        let value: serde_json::Value = serde_json::from_str(output.stdout.trim())?;
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "ERR_CORE_INVALID_INPUT");
        assert_eq!(output.exit_code, ExitCode::Usage);
        Ok(())
    }

    #[test]
    fn cli_parses_chat_send_flags() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "cli",
            "--json",
            "--settings",
            "/tmp/polychat/settings.toml",
            "chat",
            "send",
            "--provider",
            "anthropic",
            "--message",
            "hello",
            "--max-tokens",
            "64",
        ])?;
        assert!(cli.output.json);
        assert_eq!(
            cli.settings.path,
            Some(PathBuf::from("/tmp/polychat/settings.toml"))
        );
        match cli.command {
            Commands::Chat {
                command:
                    ChatCommands::Send {
                        provider,
                        message,
                        max_tokens,
                        api_key_env,
                        ..
                    },
            } => {
                assert_eq!(provider, "anthropic");
                assert_eq!(message, "hello");
                assert_eq!(max_tokens, Some(64));
                assert_eq!(api_key_env, "POLYCHAT_API_KEY");
            },
            _ => return Err("expected chat send command".into()),
        }
        Ok(())
    }

    #[test]
    fn cli_parses_config_show_domain() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from(["cli", "config", "show", "topics", "--refresh"])?;
        match cli.command {
            Commands::Config {
                command: ConfigCommands::Show {
                    domain, refresh, ..
                },
            } => {
                assert_eq!(ConfigDomain::from(domain), ConfigDomain::Topics);
                assert!(refresh);
            },
            _ => return Err("expected config show command".into()),
        }
        Ok(())
    }

    #[test]
    fn unknown_domain_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["cli", "config", "show", "weather"]).is_err());
    }

    #[test]
    fn log_info_respects_no_progress() {
        let mut stderr = String::new();
        log_info(&mut stderr, "message", true);
        assert!(stderr.is_empty());
    }
}
