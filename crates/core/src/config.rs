use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::MatchWeights;
use crate::subids::SubIdTemplate;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub template: TemplateConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    /// Category catalog JSON. Without it only product-supplied category data
    /// is available.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct TemplateConfig {
    pub name: String,
    pub platform_token: String,
    pub partner_token: String,
    pub prefix: String,
}

#[derive(Clone, Debug)]
pub struct MatchingConfig {
    pub base_weight: u32,
    pub early_bonus: u32,
    pub early_window: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub template_prefix: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let template = SubIdTemplate::default();
        let weights = MatchWeights::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://affilink.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            catalog: CatalogConfig::default(),
            template: TemplateConfig {
                name: template.name,
                platform_token: template.platform_token,
                partner_token: template.partner_token,
                prefix: template.prefix,
            },
            matching: MatchingConfig {
                base_weight: weights.base_weight,
                early_bonus: weights.early_bonus,
                early_window: weights.early_window,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl TemplateConfig {
    pub fn to_template(&self) -> SubIdTemplate {
        let defaults = SubIdTemplate::default();
        let is_default = self.platform_token == defaults.platform_token
            && self.partner_token == defaults.partner_token
            && self.prefix == defaults.prefix;
        SubIdTemplate {
            name: self.name.clone(),
            platform_token: self.platform_token.clone(),
            partner_token: self.partner_token.clone(),
            prefix: self.prefix.clone(),
            is_default,
        }
    }
}

impl MatchingConfig {
    pub fn weights(&self) -> MatchWeights {
        MatchWeights {
            base_weight: self.base_weight,
            early_bonus: self.early_bonus,
            early_window: self.early_window,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("affilink.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(template) = patch.template {
            if let Some(name) = template.name {
                self.template.name = name;
            }
            if let Some(platform_token) = template.platform_token {
                self.template.platform_token = platform_token;
            }
            if let Some(partner_token) = template.partner_token {
                self.template.partner_token = partner_token;
            }
            if let Some(prefix) = template.prefix {
                self.template.prefix = prefix;
            }
        }

        if let Some(matching) = patch.matching {
            if let Some(base_weight) = matching.base_weight {
                self.matching.base_weight = base_weight;
            }
            if let Some(early_bonus) = matching.early_bonus {
                self.matching.early_bonus = early_bonus;
            }
            if let Some(early_window) = matching.early_window {
                self.matching.early_window = early_window;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("AFFILINK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("AFFILINK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("AFFILINK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("AFFILINK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("AFFILINK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AFFILINK_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("AFFILINK_TEMPLATE_NAME") {
            self.template.name = value;
        }
        if let Some(value) = read_env("AFFILINK_TEMPLATE_PLATFORM_TOKEN") {
            self.template.platform_token = value;
        }
        if let Some(value) = read_env("AFFILINK_TEMPLATE_PARTNER_TOKEN") {
            self.template.partner_token = value;
        }
        if let Some(value) = read_env("AFFILINK_TEMPLATE_PREFIX") {
            self.template.prefix = value;
        }

        if let Some(value) = read_env("AFFILINK_MATCHING_BASE_WEIGHT") {
            self.matching.base_weight = parse_u32("AFFILINK_MATCHING_BASE_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("AFFILINK_MATCHING_EARLY_BONUS") {
            self.matching.early_bonus = parse_u32("AFFILINK_MATCHING_EARLY_BONUS", &value)?;
        }
        if let Some(value) = read_env("AFFILINK_MATCHING_EARLY_WINDOW") {
            self.matching.early_window = parse_usize("AFFILINK_MATCHING_EARLY_WINDOW", &value)?;
        }

        let log_level =
            read_env("AFFILINK_LOGGING_LEVEL").or_else(|| read_env("AFFILINK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AFFILINK_LOGGING_FORMAT").or_else(|| read_env("AFFILINK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(template_prefix) = overrides.template_prefix {
            self.template.prefix = template_prefix;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_catalog(&self.catalog)?;
        validate_template(&self.template)?;
        validate_matching(&self.matching)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("affilink.toml"), PathBuf::from("config/affilink.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    match &catalog.path {
        Some(path) if path.as_os_str().is_empty() => Err(ConfigError::Validation(
            "catalog.path must not be empty when set".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_template(template: &TemplateConfig) -> Result<(), ConfigError> {
    if template.name.trim().is_empty() {
        return Err(ConfigError::Validation("template.name is required".to_string()));
    }
    if template.platform_token.trim().is_empty() {
        return Err(ConfigError::Validation("template.platform_token is required".to_string()));
    }
    if template.partner_token.trim().is_empty() {
        return Err(ConfigError::Validation("template.partner_token is required".to_string()));
    }

    let prefix = template.prefix.as_str();
    let valid_prefix = (1..=8).contains(&prefix.len())
        && prefix.chars().all(|ch| ch.is_ascii_uppercase());
    if !valid_prefix {
        return Err(ConfigError::Validation(format!(
            "template.prefix `{prefix}` must be 1 to 8 uppercase ASCII letters (e.g. `SM`)"
        )));
    }

    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if matching.base_weight == 0 {
        return Err(ConfigError::Validation(
            "matching.base_weight must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    catalog: Option<CatalogPatch>,
    template: Option<TemplatePatch>,
    matching: Option<MatchingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct TemplatePatch {
    name: Option<String>,
    platform_token: Option<String>,
    partner_token: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    base_weight: Option<u32>,
    early_bonus: Option<u32>,
    early_window: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
