//! Info command handler.

use crate::CliOutput;
use crate::error::CliError;
use crate::format::OutputMode;
use polychat_config::{DEFAULT_TIMEOUT_MS, bundled_json};
use polychat_domain::{ConfigDomain, ProtocolFamily};
use polychat_infra::infra_crate_version;
use serde_json::{Map, Value, json};

struct BundledVersion {
    domain: ConfigDomain,
    version: String,
}

/// Run the info command.
pub fn run_info(mode: OutputMode) -> Result<CliOutput, CliError> {
    let bundled = bundled_versions();
    let protocols: Vec<&str> = ProtocolFamily::ALL
        .iter()
        .map(|family| family.as_str())
        .collect();

    let mut payload = Map::new();
    payload.insert(
        "build".to_string(),
        json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "infraVersion": infra_crate_version(),
        }),
    );
    payload.insert(
        "bundled".to_string(),
        bundled
            .iter()
            .map(|item| (item.domain.as_str().to_string(), Value::from(item.version.as_str())))
            .collect::<Map<_, _>>()
            .into(),
    );
    payload.insert("protocols".to_string(), json!(protocols));
    payload.insert("defaultTimeoutMs".to_string(), json!(DEFAULT_TIMEOUT_MS));

    let stdout = mode.render_ok("info", payload, || format_info_text(&bundled, &protocols))?;
    Ok(CliOutput::ok(stdout, String::new()))
}

fn bundled_versions() -> Vec<BundledVersion> {
    ConfigDomain::ALL
        .into_iter()
        .map(|domain| {
            let version = serde_json::from_str::<Value>(bundled_json(domain))
                .ok()
                .and_then(|value| value.get("version").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string());
            BundledVersion { domain, version }
        })
        .collect()
}

fn format_info_text(bundled: &[BundledVersion], protocols: &[&str]) -> String {
    let mut out = format!(
        "status: ok\nname: {}\nversion: {}\ninfra: {}\nprotocols: {}\ntimeoutMs: {}\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        infra_crate_version(),
        protocols.join(","),
        DEFAULT_TIMEOUT_MS,
    );
    for item in bundled {
        out.push_str(&format!("bundled.{}: {}\n", item.domain, item.version));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;

    #[test]
    fn info_json_lists_every_domain_and_protocol() -> Result<(), Box<dyn std::error::Error>> {
        let output = run_info(OutputMode::quiet(OutputFormat::Json))?;
        let value: Value = serde_json::from_str(output.stdout.trim())?;
        assert_eq!(value["status"], "ok");
        for domain in ConfigDomain::ALL {
            assert!(value["bundled"][domain.as_str()].is_string());
        }
        assert_eq!(value["protocols"].as_array().map(Vec::len), Some(4));
        Ok(())
    }

    #[test]
    fn info_text_is_line_oriented() -> Result<(), Box<dyn std::error::Error>> {
        let output = run_info(OutputMode::quiet(OutputFormat::Text))?;
        assert!(output.stdout.starts_with("status: ok\n"));
        assert!(output.stdout.contains("bundled.topics: "));
        Ok(())
    }
}
