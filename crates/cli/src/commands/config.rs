use std::env;
use std::fs;
use std::path::Path;

use kintai_core::config::resolve_config_path;
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value as JsonValue};
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// Effective values keyed by config path, each with the layer it came from.
pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let file_path = resolve_config_path(None);
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);
    let source = |key: &str, env_keys: &[&str]| {
        field_source(key, env_keys, file_doc.as_ref(), file_path.as_deref())
    };

    let fields = [
        (
            "database.url",
            config.database.url.clone(),
            source("database.url", &["KINTAI_DATABASE_URL"]),
        ),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            source("database.max_connections", &["KINTAI_DATABASE_MAX_CONNECTIONS"]),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            source("database.timeout_secs", &["KINTAI_DATABASE_TIMEOUT_SECS"]),
        ),
        (
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            source("slack.bot_token", &["KINTAI_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"]),
        ),
        (
            "slack.signing_secret",
            redact_secret(config.slack.signing_secret.expose_secret()),
            source("slack.signing_secret", &["KINTAI_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET"]),
        ),
        (
            "slack.api_base_url",
            config.slack.api_base_url.clone(),
            source("slack.api_base_url", &["KINTAI_SLACK_API_BASE_URL"]),
        ),
        (
            "slack.request_timeout_secs",
            config.slack.request_timeout_secs.to_string(),
            source("slack.request_timeout_secs", &["KINTAI_SLACK_REQUEST_TIMEOUT_SECS"]),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", &["KINTAI_SERVER_BIND_ADDRESS"]),
        ),
        (
            "server.port",
            config.server.port.to_string(),
            source("server.port", &["KINTAI_SERVER_PORT", "PORT"]),
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            source("server.graceful_shutdown_secs", &["KINTAI_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
        ),
        (
            "attendance.overview_window_days",
            config.attendance.overview_window_days.to_string(),
            source(
                "attendance.overview_window_days",
                &["KINTAI_ATTENDANCE_OVERVIEW_WINDOW_DAYS"],
            ),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["KINTAI_LOGGING_LEVEL", "KINTAI_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            source("logging.format", &["KINTAI_LOGGING_FORMAT", "KINTAI_LOG_FORMAT"]),
        ),
    ];

    let mut data = Map::new();
    for (key, value, source) in fields {
        data.insert(key.to_string(), json!({ "value": value, "source": source }));
    }

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        Some(JsonValue::Object(data)),
    )
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() { "<empty>" } else { "<redacted>" }.to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("xoxb-123-456"), "xoxb-***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_secret("8f742231b10e8888abcd99yyyzzz85a5"), "<redacted>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc: Value = "[attendance]\noverview_window_days = 14\n".parse().expect("toml");
        assert!(contains_path(&doc, "attendance.overview_window_days"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
