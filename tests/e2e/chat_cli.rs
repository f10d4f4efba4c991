//! Chat command E2E tests against a mock provider.

use serde_json::json;
use std::io;
use std::process::{Command, Output};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn polychat(args: Vec<String>, api_key: Option<&'static str>) -> io::Result<Output> {
    tokio::task::spawn_blocking(move || {
        let mut command = Command::new(env!("CARGO_BIN_EXE_polychat"));
        command
            .args(&args)
            .env_remove("POLYCHAT_CACHE_PROVIDER")
            .env_remove("POLYCHAT_CACHE_PATH")
            .env_remove("POLYCHAT_API_KEY");
        if let Some(key) = api_key {
            command.env("POLYCHAT_API_KEY", key);
        }
        command.output()
    })
    .await
    .map_err(io::Error::other)?
}

fn loopback_override(provider: &str, endpoint: &str) -> String {
    json!({
        "http": { "allowLoopback": true, "timeoutMs": 2000 },
        "providers": { provider: { "endpoint": endpoint } }
    })
    .to_string()
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_send_prints_reply_from_overridden_endpoint() -> io::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer example"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{ "message": { "role": "assistant", "content": "pong" } }],
            "usage": { "prompt_tokens": 4, "completion_tokens": 1, "total_tokens": 5 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let overrides = loopback_override("openai", &format!("{}/v1/chat/completions", server.uri()));
    let mut argv = args(&["--json", "--overrides-json"]);
    argv.push(overrides);
    argv.extend(args(&[
        "chat", "send", "--provider", "openai", "--model", "gpt-4o-mini", "--message", "ping",
    ]));
    let output = polychat(argv, Some("example")).await?; // pragma: allowlist secret
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(io::Error::other)?;
    assert_eq!(value.get("content").and_then(|v| v.as_str()), Some("pong"));
    assert_eq!(
        value
            .get("usage")
            .and_then(|usage| usage.get("totalTokens"))
            .and_then(|v| v.as_u64()),
        Some(5)
    );
    assert!(!String::from_utf8_lossy(&output.stdout).contains("example"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_error_maps_to_api_error_code() -> io::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "type": "authentication_error", "message": "invalid x-api-key" }
        })))
        .mount(&server)
        .await;

    let overrides = loopback_override("anthropic", &format!("{}/v1/messages", server.uri()));
    let mut argv = args(&["--json", "--overrides-json"]);
    argv.push(overrides);
    argv.extend(args(&["chat", "send", "--provider", "anthropic", "--message", "hi"]));
    let output = polychat(argv, Some("wrong")).await?;

    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(io::Error::other)?;
    let error = value
        .get("error")
        .ok_or_else(|| io::Error::other("missing error"))?;
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("API_ERROR"));
    assert_eq!(
        error
            .get("meta")
            .and_then(|meta| meta.get("status"))
            .and_then(|v| v.as_str()),
        Some("401")
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_provider_exits_with_invalid_input() -> io::Result<()> {
    let output = polychat(
        args(&["--json", "chat", "send", "--provider", "nonexistent", "--message", "hi"]),
        None,
    )
    .await?;

    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(io::Error::other)?;
    assert_eq!(
        value
            .get("error")
            .and_then(|error| error.get("code"))
            .and_then(|v| v.as_str()),
        Some("UNSUPPORTED_PROVIDER")
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_provider_times_out_with_transport_exit_code() -> io::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "choices": [{ "message": { "content": "late" } }] }))
                .set_delay(std::time::Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let overrides = loopback_override("groq", &format!("{}/openai/v1/chat/completions", server.uri()));
    let mut argv = args(&["--json", "--overrides-json"]);
    argv.push(overrides);
    argv.extend(args(&["chat", "send", "--provider", "groq", "--message", "hi"]));
    let output = polychat(argv, Some("example")).await?; // pragma: allowlist secret

    assert_eq!(output.status.code(), Some(3));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(io::Error::other)?;
    assert_eq!(
        value
            .get("error")
            .and_then(|error| error.get("code"))
            .and_then(|v| v.as_str()),
        Some("REQUEST_TIMEOUT")
    );
    Ok(())
}
