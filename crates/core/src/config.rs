use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::classify::{ClassifierConfig, KeywordTable, KeywordTableError};
use crate::escalation::EscalationConfig;
use crate::normalize::NormalizerConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub normalizer: NormalizerConfig,
    pub classifier: ClassifierConfig,
    pub escalation: EscalationConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub slack: SlackConfig,
    pub whatsapp: WhatsAppConfig,
    pub crm: CrmConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// TTL for cached responses, seconds.
    pub response_cache_ttl_secs: u64,
    /// Idle TTL for per-user conversation context, seconds.
    pub context_idle_ttl_secs: u64,
    /// Upper bound on the CRM enrichment fetch, milliseconds.
    pub crm_timeout_ms: u64,
    /// Optional response-cache capacity bound (entries).
    pub cache_capacity: Option<u64>,
    /// Optional TOML keyword table replacing the built-in classification table.
    pub keyword_table_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
    pub phone_number: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
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

/// Programmatic overrides applied after file and environment, highest
/// precedence. Used by the CLI and tests.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub crm_enabled: Option<bool>,
    pub crm_base_url: Option<String>,
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
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("could not read keyword table `{path}`: {source}")]
    ReadKeywordTable { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    KeywordTable(#[from] KeywordTableError),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                response_cache_ttl_secs: 3600,
                context_idle_ttl_secs: 1800,
                crm_timeout_ms: 1500,
                cache_capacity: None,
                keyword_table_path: None,
            },
            normalizer: NormalizerConfig::default(),
            classifier: ClassifierConfig::default(),
            escalation: EscalationConfig::default(),
            database: DatabaseConfig {
                url: "sqlite://palaver.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            slack: SlackConfig { bot_token: None },
            whatsapp: WhatsAppConfig { account_sid: None, auth_token: None, phone_number: None },
            crm: CrmConfig { enabled: false, base_url: None, api_token: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("palaver.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Resolve the classification keyword table: the configured TOML file when
    /// set, the built-in v1 table otherwise.
    pub fn load_keyword_table(&self) -> Result<KeywordTable, ConfigError> {
        match &self.engine.keyword_table_path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .map_err(|source| ConfigError::ReadKeywordTable { path: path.clone(), source })?;
                Ok(KeywordTable::from_toml_str(&raw)?)
            }
            None => Ok(KeywordTable::builtin()),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(value) = engine.response_cache_ttl_secs {
                self.engine.response_cache_ttl_secs = value;
            }
            if let Some(value) = engine.context_idle_ttl_secs {
                self.engine.context_idle_ttl_secs = value;
            }
            if let Some(value) = engine.crm_timeout_ms {
                self.engine.crm_timeout_ms = value;
            }
            if let Some(value) = engine.cache_capacity {
                self.engine.cache_capacity = Some(value);
            }
            if let Some(value) = engine.keyword_table_path {
                self.engine.keyword_table_path = Some(value);
            }
        }

        if let Some(normalizer) = patch.normalizer {
            if let Some(value) = normalizer.order_number_min_len {
                self.normalizer.order_number_min_len = value;
            }
            if let Some(value) = normalizer.phone_min_digits {
                self.normalizer.phone_min_digits = value;
            }
            if let Some(value) = normalizer.product_lexicon {
                self.normalizer.product_lexicon = value;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(value) = classifier.baseline_confidence {
                self.classifier.baseline_confidence = value;
            }
            if let Some(value) = classifier.early_token_bonus {
                self.classifier.early_token_bonus = value;
            }
            if let Some(value) = classifier.early_token_window {
                self.classifier.early_token_window = value;
            }
            if let Some(value) = classifier.score_scale {
                self.classifier.score_scale = value;
            }
        }

        if let Some(escalation) = patch.escalation {
            if let Some(value) = escalation.confidence_threshold {
                self.escalation.confidence_threshold = value;
            }
            if let Some(value) = escalation.repeat_turn_threshold {
                self.escalation.repeat_turn_threshold = value;
            }
        }

        if let Some(database) = patch.database {
            if let Some(value) = database.url {
                self.database.url = value;
            }
            if let Some(value) = database.max_connections {
                self.database.max_connections = value;
            }
            if let Some(value) = database.timeout_secs {
                self.database.timeout_secs = value;
            }
        }

        if let Some(server) = patch.server {
            if let Some(value) = server.bind_address {
                self.server.bind_address = value;
            }
            if let Some(value) = server.port {
                self.server.port = value;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(value) = slack.bot_token {
                self.slack.bot_token = Some(SecretString::from(value));
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(value) = whatsapp.account_sid {
                self.whatsapp.account_sid = Some(value);
            }
            if let Some(value) = whatsapp.auth_token {
                self.whatsapp.auth_token = Some(SecretString::from(value));
            }
            if let Some(value) = whatsapp.phone_number {
                self.whatsapp.phone_number = Some(value);
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(value) = crm.enabled {
                self.crm.enabled = value;
            }
            if let Some(value) = crm.base_url {
                self.crm.base_url = Some(value);
            }
            if let Some(value) = crm.api_token {
                self.crm.api_token = Some(SecretString::from(value));
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(value) = logging.level {
                self.logging.level = value;
            }
            if let Some(value) = logging.format {
                self.logging.format = value;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PALAVER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PALAVER_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("PALAVER_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        if let Some(value) = read_env("PALAVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PALAVER_PORT") {
            self.server.port = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "PALAVER_PORT".to_string(),
                value,
            })?;
        }
        if let Some(value) = read_env("PALAVER_SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("PALAVER_TWILIO_ACCOUNT_SID") {
            self.whatsapp.account_sid = Some(value);
        }
        if let Some(value) = read_env("PALAVER_TWILIO_AUTH_TOKEN") {
            self.whatsapp.auth_token = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("PALAVER_TWILIO_PHONE_NUMBER") {
            self.whatsapp.phone_number = Some(value);
        }
        if let Some(value) = read_env("PALAVER_CRM_ENABLED") {
            self.crm.enabled = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidEnvOverride {
                        key: "PALAVER_CRM_ENABLED".to_string(),
                        value,
                    })
                }
            };
        }
        if let Some(value) = read_env("PALAVER_CRM_BASE_URL") {
            self.crm.base_url = Some(value);
        }
        if let Some(value) = read_env("PALAVER_CRM_API_TOKEN") {
            self.crm.api_token = Some(SecretString::from(value));
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(value) = overrides.database_url {
            self.database.url = value;
        }
        if let Some(value) = overrides.log_level {
            self.logging.level = value;
        }
        if let Some(value) = overrides.bind_address {
            self.server.bind_address = value;
        }
        if let Some(value) = overrides.port {
            self.server.port = value;
        }
        if let Some(value) = overrides.crm_enabled {
            self.crm.enabled = value;
        }
        if let Some(value) = overrides.crm_base_url {
            self.crm.base_url = Some(value);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.classifier.baseline_confidence) {
            return Err(ConfigError::Validation(
                "classifier.baseline_confidence must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.escalation.confidence_threshold) {
            return Err(ConfigError::Validation(
                "escalation.confidence_threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.escalation.repeat_turn_threshold == 0 {
            return Err(ConfigError::Validation(
                "escalation.repeat_turn_threshold must be at least 1".to_string(),
            ));
        }
        if self.engine.response_cache_ttl_secs == 0 || self.engine.context_idle_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "engine TTLs must be greater than zero".to_string(),
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.crm.enabled && self.crm.base_url.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(ConfigError::Validation(
                "crm.base_url is required when crm.enabled is true".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from("palaver.toml");
            default.exists().then_some(default)
        }
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    normalizer: Option<NormalizerPatch>,
    classifier: Option<ClassifierPatch>,
    escalation: Option<EscalationPatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    slack: Option<SlackPatch>,
    whatsapp: Option<WhatsAppPatch>,
    crm: Option<CrmPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    response_cache_ttl_secs: Option<u64>,
    context_idle_ttl_secs: Option<u64>,
    crm_timeout_ms: Option<u64>,
    cache_capacity: Option<u64>,
    keyword_table_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct NormalizerPatch {
    order_number_min_len: Option<usize>,
    phone_min_digits: Option<usize>,
    product_lexicon: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    baseline_confidence: Option<f64>,
    early_token_bonus: Option<f64>,
    early_token_window: Option<usize>,
    score_scale: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct EscalationPatch {
    confidence_threshold: Option<f64>,
    repeat_turn_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    account_sid: Option<String>,
    auth_token: Option<String>,
    phone_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
