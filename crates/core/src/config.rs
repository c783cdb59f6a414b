use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HISTORY_CAP: usize = 20;
pub const DEFAULT_PROMPT_HISTORY_TURNS: usize = 6;
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 6000;
pub const DEFAULT_TEMPERATURE: f32 = 0.75;
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_TURN_BUDGET_MS: u64 = 8000;

pub const ENV_PROFILE_TABLE: &str = "PROFILE_TABLE_NAME";
pub const ENV_GROQ_API_KEY: &str = "GROQ_API_KEY";
pub const ENV_DATA_DIR: &str = "COMADRE_DATA_DIR";
pub const ENV_LLM_BASE_URL: &str = "COMADRE_LLM_BASE_URL";
pub const ENV_LLM_MODEL: &str = "COMADRE_LLM_MODEL";
pub const ENV_HISTORY_CAP: &str = "COMADRE_HISTORY_CAP";

/// Identifier of the profile table. For the file backend this is the
/// directory under the data dir that holds one document per user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingTableName);
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || trimmed.starts_with('.')
        {
            return Err(ConfigError::InvalidTableName(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

/// Maximum number of entries kept in each profile history.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryCap(usize);

impl HistoryCap {
    pub fn new(cap: usize) -> Result<Self, ConfigError> {
        if cap == 0 {
            return Err(ConfigError::ZeroHistoryCap);
        }
        Ok(Self(cap))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for HistoryCap {
    fn default() -> Self {
        Self(DEFAULT_HISTORY_CAP)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub base_url: Url,
    pub model: String,
    pub api_key: Option<ApiKey>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub attempt_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_LLM_BASE_URL).expect("default base url is valid"),
            model: DEFAULT_LLM_MODEL.to_owned(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub table: TableName,
    pub history_cap: HistoryCap,
}

impl StoreConfig {
    pub fn table_dir(&self) -> PathBuf {
        self.data_dir.join(self.table.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub turn_budget: Duration,
    pub offline: bool,
}

impl AppConfig {
    /// Checks the startup invariants. A missing credential is only fatal when
    /// replies are actually generated by the remote model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.offline && self.llm.api_key.is_none() {
            return Err(ConfigError::MissingApiKey(ENV_GROQ_API_KEY));
        }
        if self.llm.attempt_timeout.is_zero() || self.turn_budget.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.llm.attempt_timeout > self.turn_budget {
            return Err(ConfigError::AttemptExceedsBudget {
                attempt_ms: self.llm.attempt_timeout.as_millis() as u64,
                budget_ms: self.turn_budget.as_millis() as u64,
            });
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("profile table name is required (set PROFILE_TABLE_NAME)")]
    MissingTableName,
    #[error("invalid profile table name: {0:?}")]
    InvalidTableName(String),
    #[error("llm credential is required (set {0})")]
    MissingApiKey(&'static str),
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("history cap must be > 0")]
    ZeroHistoryCap,
    #[error("invalid number for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("invalid llm base url: {0}")]
    InvalidBaseUrl(String),
    #[error("timeouts must be > 0 ms")]
    ZeroTimeout,
    #[error("generation attempt timeout ({attempt_ms} ms) exceeds turn budget ({budget_ms} ms)")]
    AttemptExceedsBudget { attempt_ms: u64, budget_ms: u64 },
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn resolve_table_name(
    cli_value: Option<String>,
    env: &impl Env,
) -> Result<TableName, ConfigError> {
    match resolve_optional_string(cli_value, ENV_PROFILE_TABLE, env) {
        Some(v) => TableName::new(v),
        None => Err(ConfigError::MissingTableName),
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

pub fn resolve_history_cap(
    cli_value: Option<usize>,
    env: &impl Env,
) -> Result<HistoryCap, ConfigError> {
    let raw = match cli_value {
        Some(v) => v,
        None => match env.var(ENV_HISTORY_CAP) {
            Some(s) => s.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: ENV_HISTORY_CAP,
                value: s,
            })?,
            None => DEFAULT_HISTORY_CAP,
        },
    };
    HistoryCap::new(raw)
}

pub fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(format!(
            "unsupported scheme {}",
            url.scheme()
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(api_key: Option<&str>, offline: bool) -> AppConfig {
        AppConfig {
            store: StoreConfig {
                data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                table: TableName::new("alexa-virtual-companion").expect("valid"),
                history_cap: HistoryCap::default(),
            },
            llm: LlmConfig {
                api_key: api_key.map(|k| ApiKey::new(k).expect("valid")),
                ..LlmConfig::default()
            },
            turn_budget: Duration::from_millis(DEFAULT_TURN_BUDGET_MS),
            offline,
        }
    }

    #[test]
    fn api_key_cli_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_GROQ_API_KEY, "env-key");
        let key = resolve_api_key(Some("cli-key".to_owned()), ENV_GROQ_API_KEY, &env)
            .expect("valid key")
            .expect("present");
        assert_eq!(key.expose(), "cli-key");
    }

    #[test]
    fn api_key_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_GROQ_API_KEY, "env-key");
        let key = resolve_api_key(None, ENV_GROQ_API_KEY, &env)
            .expect("valid key")
            .expect("present");
        assert_eq!(key.expose(), "env-key");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("gsk_secret").expect("valid");
        assert!(!format!("{key:?}").contains("gsk_secret"));
    }

    #[test]
    fn missing_table_is_a_config_error() {
        let env = MapEnv::default();
        assert_eq!(
            resolve_table_name(None, &env),
            Err(ConfigError::MissingTableName)
        );
        let env = MapEnv::default().with_var(ENV_PROFILE_TABLE, "   ");
        assert_eq!(
            resolve_table_name(None, &env),
            Err(ConfigError::MissingTableName)
        );
    }

    #[test]
    fn table_name_rejects_path_segments() {
        assert!(matches!(
            TableName::new("../etc"),
            Err(ConfigError::InvalidTableName(_))
        ));
        assert!(TableName::new("alexa-virtual-companion").is_ok());
    }

    #[test]
    fn history_cap_from_env_and_validation() {
        let env = MapEnv::default().with_var(ENV_HISTORY_CAP, "8");
        assert_eq!(resolve_history_cap(None, &env).expect("valid").get(), 8);
        assert_eq!(resolve_history_cap(Some(3), &env).expect("valid").get(), 3);

        let env = MapEnv::default().with_var(ENV_HISTORY_CAP, "lots");
        assert!(matches!(
            resolve_history_cap(None, &env),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert_eq!(
            resolve_history_cap(Some(0), &MapEnv::default()),
            Err(ConfigError::ZeroHistoryCap)
        );
        assert_eq!(
            resolve_history_cap(None, &MapEnv::default())
                .expect("default")
                .get(),
            DEFAULT_HISTORY_CAP
        );
    }

    #[test]
    fn validate_requires_credential_unless_offline() {
        assert_eq!(
            config_with(None, false).validate(),
            Err(ConfigError::MissingApiKey(ENV_GROQ_API_KEY))
        );
        assert!(config_with(None, true).validate().is_ok());
        assert!(config_with(Some("gsk"), false).validate().is_ok());
    }

    #[test]
    fn validate_rejects_attempt_longer_than_budget() {
        let mut cfg = config_with(Some("gsk"), false);
        cfg.turn_budget = Duration::from_millis(1000);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::AttemptExceedsBudget { .. })
        ));
    }

    #[test]
    fn base_url_must_be_http() {
        assert!(parse_base_url("https://api.groq.com/openai/v1").is_ok());
        assert!(parse_base_url("ftp://example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn resolve_string_with_default_falls_through() {
        let env = MapEnv::default().with_var(ENV_LLM_MODEL, "env");
        assert_eq!(
            resolve_string_with_default(Some("cli".to_owned()), ENV_LLM_MODEL, &env, "def"),
            "cli"
        );
        assert_eq!(
            resolve_string_with_default(None, ENV_LLM_MODEL, &env, "def"),
            "env"
        );
        assert_eq!(
            resolve_string_with_default(None, ENV_LLM_MODEL, &MapEnv::default(), "def"),
            "def"
        );
    }
}
