use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use affilink_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    let fields: [(&str, String, &[&str]); 12] = [
        ("database.url", config.database.url.clone(), &["AFFILINK_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["AFFILINK_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["AFFILINK_DATABASE_TIMEOUT_SECS"],
        ),
        ("catalog.path", catalog_path, &["AFFILINK_CATALOG_PATH"]),
        ("template.name", config.template.name.clone(), &["AFFILINK_TEMPLATE_NAME"]),
        (
            "template.platform_token",
            config.template.platform_token.clone(),
            &["AFFILINK_TEMPLATE_PLATFORM_TOKEN"],
        ),
        (
            "template.partner_token",
            config.template.partner_token.clone(),
            &["AFFILINK_TEMPLATE_PARTNER_TOKEN"],
        ),
        ("template.prefix", config.template.prefix.clone(), &["AFFILINK_TEMPLATE_PREFIX"]),
        (
            "matching.base_weight",
            config.matching.base_weight.to_string(),
            &["AFFILINK_MATCHING_BASE_WEIGHT"],
        ),
        (
            "matching.early_bonus",
            config.matching.early_bonus.to_string(),
            &["AFFILINK_MATCHING_EARLY_BONUS"],
        ),
        (
            "matching.early_window",
            config.matching.early_window.to_string(),
            &["AFFILINK_MATCHING_EARLY_WINDOW"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["AFFILINK_LOGGING_LEVEL", "AFFILINK_LOG_LEVEL"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in &fields {
        lines.push(render_line(
            key,
            value,
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        field_source(
            "logging.format",
            &["AFFILINK_LOGGING_FORMAT", "AFFILINK_LOG_FORMAT"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("affilink.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/affilink.toml");
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
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
