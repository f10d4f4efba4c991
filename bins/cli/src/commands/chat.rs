//! Chat command handlers.

use crate::error::CliError;
use crate::format::OutputMode;
use crate::{CliOutput, SettingsArgs, async_runtime, format_error_output, load_settings, log_info};
use polychat_adapters::TracingLogger;
use polychat_config::{ChatMessageDto, ChatSendRequestDto, validate_chat_request};
use polychat_domain::ChatResponse;
use polychat_infra::ChatRuntime;
use polychat_shared::RequestContext;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Flags for `chat send`.
#[derive(Debug, Clone, Copy)]
pub struct ChatSendInput<'a> {
    pub provider: &'a str,
    pub message: &'a str,
    pub model: Option<&'a str>,
    pub system: Option<&'a str>,
    pub endpoint: Option<&'a str>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub api_key_env: &'a str,
}

impl ChatSendInput<'_> {
    fn to_dto(self) -> ChatSendRequestDto {
        ChatSendRequestDto {
            provider: self.provider.to_string(),
            model: self.model.map(str::to_string),
            endpoint: self.endpoint.map(str::to_string),
            messages: vec![ChatMessageDto {
                role: "user".to_string(),
                content: self.message.to_string(),
            }],
            system_prompt: self.system.map(str::to_string),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Run `chat send`.
pub fn run_chat_send(
    mode: OutputMode,
    settings: &SettingsArgs,
    input: &ChatSendInput<'_>,
) -> Result<CliOutput, CliError> {
    let mut stderr = String::new();
    let credential = std::env::var(input.api_key_env).unwrap_or_else(|_| {
        log_info(
            &mut stderr,
            &format!("{} is not set; sending without a credential", input.api_key_env),
            mode.no_progress,
        );
        String::new()
    });

    let request = match validate_chat_request(&input.to_dto(), credential) {
        Ok(request) => request,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    let settings = match load_settings(settings) {
        Ok(settings) => settings,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    let runtime = match ChatRuntime::build(settings, Arc::new(TracingLogger::new())) {
        Ok(runtime) => runtime,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let ctx = RequestContext::new_request();
    let response = match async_runtime()?.block_on(runtime.send_chat(&ctx, request)) {
        Ok(response) => response,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    log_info(
        &mut stderr,
        &format!(
            "{} replied ({} tokens)",
            input.provider, response.usage.total_tokens
        ),
        mode.no_progress,
    );
    let stdout = mode.render_ok("chat", response_payload(input.provider, &response), || {
        let mut out = response.content.clone();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    })?;
    Ok(CliOutput::ok(stdout, stderr))
}

fn response_payload(provider: &str, response: &ChatResponse) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("provider".to_string(), Value::from(provider));
    payload.insert(
        "model".to_string(),
        response.model.as_deref().map_or(Value::Null, Value::from),
    );
    payload.insert("content".to_string(), Value::from(response.content.as_str()));
    payload.insert(
        "usage".to_string(),
        json!({
            "promptTokens": response.usage.prompt_tokens,
            "completionTokens": response.usage.completion_tokens,
            "totalTokens": response.usage.total_tokens,
        }),
    );
    payload
}
