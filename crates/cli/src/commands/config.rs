use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use outreach_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let line = |key: &str, value: &str, env_key: &str| {
        render_line(
            key,
            value,
            field_source(key, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref()),
        )
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(line(
        "sheets.spreadsheet_id",
        &config.sheets.spreadsheet_id,
        "OUTREACH_SHEETS_SPREADSHEET_ID",
    ));
    lines.push(line(
        "sheets.sheet_name",
        config.sheets.sheet_name.as_deref().unwrap_or("<first sheet>"),
        "OUTREACH_SHEETS_SHEET_NAME",
    ));
    lines.push(line(
        "sheets.access_token",
        &redact_token(config.sheets.access_token.expose_secret()),
        "OUTREACH_SHEETS_ACCESS_TOKEN",
    ));
    lines.push(line("sheets.base_url", &config.sheets.base_url, "OUTREACH_SHEETS_BASE_URL"));

    lines.push(line(
        "telegram.bot_token",
        &redact_token(config.telegram.bot_token.expose_secret()),
        "OUTREACH_TELEGRAM_BOT_TOKEN",
    ));
    lines.push(line(
        "telegram.poll_timeout_secs",
        &config.telegram.poll_timeout_secs.to_string(),
        "OUTREACH_TELEGRAM_POLL_TIMEOUT_SECS",
    ));

    let authorized = if config.bot.authorized_users.is_empty() {
        "<everyone>".to_string()
    } else {
        config.bot.authorized_users.join(",")
    };
    lines.push(line("bot.authorized_users", &authorized, "OUTREACH_BOT_AUTHORIZED_USERS"));
    lines.push(line(
        "bot.prompt_language",
        &format!("{:?}", config.bot.prompt_language),
        "OUTREACH_BOT_PROMPT_LANGUAGE",
    ));

    lines.push(line("llm.provider", &format!("{:?}", config.llm.provider), "OUTREACH_LLM_PROVIDER"));
    lines.push(line("llm.model", &config.llm.model, "OUTREACH_LLM_MODEL"));
    lines.push(line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        "OUTREACH_LLM_BASE_URL",
    ));
    lines.push(line("llm.api_key", optional_secret(config.llm.api_key.as_ref()), "OUTREACH_LLM_API_KEY"));
    lines.push(line(
        "llm.batch_size",
        &config.llm.batch_size.to_string(),
        "OUTREACH_LLM_BATCH_SIZE",
    ));

    lines.push(line(
        "transcription.api_key",
        optional_secret(config.transcription.api_key.as_ref()),
        "OUTREACH_TRANSCRIPTION_API_KEY",
    ));
    lines.push(line(
        "transcription.model",
        &config.transcription.model,
        "OUTREACH_TRANSCRIPTION_MODEL",
    ));
    lines.push(line(
        "transcription.language",
        &config.transcription.language,
        "OUTREACH_TRANSCRIPTION_LANGUAGE",
    ));

    let reclaim = config
        .queue
        .reclaim_after_secs
        .map(|secs| secs.to_string())
        .unwrap_or_else(|| "<disabled>".to_string());
    lines.push(line("queue.reclaim_after_secs", &reclaim, "OUTREACH_QUEUE_RECLAIM_AFTER_SECS"));

    lines.push(line(
        "server.bind_address",
        &config.server.bind_address,
        "OUTREACH_SERVER_BIND_ADDRESS",
    ));
    lines.push(line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        "OUTREACH_SERVER_HEALTH_CHECK_PORT",
    ));

    lines.push(line("logging.level", &config.logging.level, "OUTREACH_LOGGING_LEVEL"));
    lines.push(line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        "OUTREACH_LOGGING_FORMAT",
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("outreach.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/outreach.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn optional_secret(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

/// Keeps the non-secret prefix: the bot id of `123:abc` or the `ya29` of `ya29.abc`.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once([':', '.']) {
        return format!("{prefix}:***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn redacts_everything_after_the_prefix() {
        assert_eq!(redact_token("123456:AAE-secret"), "123456:***");
        assert_eq!(redact_token("ya29.a0AfH6"), "ya29:***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn finds_nested_keys() {
        let doc: toml::Value = "[sheets]\nspreadsheet_id = \"abc\"".parse().expect("toml");
        assert!(contains_path(&doc, "sheets.spreadsheet_id"));
        assert!(!contains_path(&doc, "sheets.access_token"));
    }
}
