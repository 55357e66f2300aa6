use anyhow::{bail, Context};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_AI_PROMPT: &str = r#"You are a URL shortening assistant, please shorten the URL provided by the user into a SLUG. The SLUG information must come from the URL itself, do not make any assumptions. A SLUG is human-readable and should not exceed three words and can be validated using regular expressions {slugRegex} . Only the best one is returned, the format must be JSON reference {"slug": "example-slug"}"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub ai: AiConfig,
    pub analytics: AnalyticsConfig,
    /// Status applied to every resolved redirect
    pub redirect_status_code: RedirectStatus,
    /// Cache TTL in seconds, shared by positive and negative entries
    pub link_cache_ttl: u64,
    pub redirect_with_query: bool,
    pub case_sensitive: bool,
    pub list_query_limit: usize,
    pub disable_bot_access_log: bool,
    pub ai_model: String,
    /// Prompt template; `{slugRegex}` is replaced with the slug pattern
    pub ai_prompt: String,
    pub slug_default_length: usize,
    pub slug_max_length: usize,
    /// Where `GET /` redirects to, if set
    pub home_url: Option<String>,
    /// Bearer token protecting `/api`; a random token is generated and logged when unset
    pub site_token: Option<String>,
    /// Send permissive CORS headers on `/api`
    pub api_cors: bool,
    /// Secret for signing list cursors; a random key is used when unset
    pub cursor_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    /// Upper bound for a single store call before it counts as unavailable
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Cloudflare account hosting the Workers AI model
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    /// Capacity of the event queue; events beyond it are dropped
    pub queue_size: usize,
    /// Maximum number of concurrent sink writes
    pub concurrency: usize,
    pub timeout_ms: u64,
    /// HMAC key for visitor IP hashes; random per process when unset
    pub ip_hash_secret: Option<String>,
}

/// Redirect status code, restricted to the redirect family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum RedirectStatus {
    MovedPermanently,
    Found,
    TemporaryRedirect,
    PermanentRedirect,
}

impl RedirectStatus {
    pub fn status_code(self) -> StatusCode {
        match self {
            RedirectStatus::MovedPermanently => StatusCode::MOVED_PERMANENTLY,
            RedirectStatus::Found => StatusCode::FOUND,
            RedirectStatus::TemporaryRedirect => StatusCode::TEMPORARY_REDIRECT,
            RedirectStatus::PermanentRedirect => StatusCode::PERMANENT_REDIRECT,
        }
    }
}

impl Default for RedirectStatus {
    fn default() -> Self {
        RedirectStatus::MovedPermanently
    }
}

impl TryFrom<u16> for RedirectStatus {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            301 => Ok(RedirectStatus::MovedPermanently),
            302 => Ok(RedirectStatus::Found),
            307 => Ok(RedirectStatus::TemporaryRedirect),
            308 => Ok(RedirectStatus::PermanentRedirect),
            other => Err(format!(
                "unsupported redirect status {other}, expected one of 301, 302, 307, 308"
            )),
        }
    }
}

impl From<RedirectStatus> for u16 {
    fn from(status: RedirectStatus) -> Self {
        status.status_code().as_u16()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            ai: AiConfig::default(),
            analytics: AnalyticsConfig::default(),
            redirect_status_code: RedirectStatus::default(),
            link_cache_ttl: 60,
            redirect_with_query: false,
            case_sensitive: false,
            list_query_limit: 500,
            disable_bot_access_log: false,
            ai_model: "@cf/meta/llama-3.1-8b-instruct".to_string(),
            ai_prompt: DEFAULT_AI_PROMPT.to_string(),
            slug_default_length: 6,
            slug_max_length: 64,
            home_url: None,
            site_token: None,
            api_cors: false,
            cursor_secret: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            url: "sqlite://./sink.db?mode=rwc".to_string(),
            max_connections: 5,
            timeout_ms: 2_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            api_token: None,
            timeout_ms: 5_000,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_size: 10_000,
            concurrency: 8,
            timeout_ms: 1_000,
            ip_hash_secret: None,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AnalyticsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from defaults, an optional `sink.toml` and `SINK_*`
    /// environment variables (nested keys use `__`, e.g. `SINK_STORE__BACKEND`).
    ///
    /// `.env` is not read here; binaries load it before anything else.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name("sink").required(false))
            .add_source(
                ::config::Environment::with_prefix("SINK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration sources")?;

        let config: Config = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.list_query_limit == 0 {
            bail!("list_query_limit must be at least 1");
        }
        if self.slug_max_length == 0 {
            bail!("slug_max_length must be at least 1");
        }
        if self.slug_default_length == 0 || self.slug_default_length > self.slug_max_length {
            bail!(
                "slug_default_length must be between 1 and slug_max_length ({})",
                self.slug_max_length
            );
        }
        if !self.ai_prompt.contains("{slugRegex}") {
            tracing::warn!(
                "ai_prompt has no {{slugRegex}} placeholder; AI slugs may not match the slug format"
            );
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.link_cache_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.redirect_status_code, RedirectStatus::MovedPermanently);
        assert_eq!(config.link_cache_ttl, 60);
        assert!(!config.case_sensitive);
        assert_eq!(config.list_query_limit, 500);
        assert_eq!(config.slug_default_length, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn api_is_closed_by_default() {
        let config = Config::default();
        assert!(config.site_token.is_none());
        assert!(!config.api_cors);
        assert!(config.analytics.ip_hash_secret.is_none());
    }

    #[test]
    fn redirect_status_accepts_only_redirect_codes() {
        assert_eq!(
            RedirectStatus::try_from(307).unwrap().status_code(),
            StatusCode::TEMPORARY_REDIRECT
        );
        assert!(RedirectStatus::try_from(200).is_err());
        assert!(RedirectStatus::try_from(303).is_err());
        assert_eq!(u16::from(RedirectStatus::PermanentRedirect), 308);
    }

    #[test]
    fn validate_rejects_default_length_above_max() {
        let config = Config {
            slug_default_length: 10,
            slug_max_length: 8,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_list_limit() {
        let config = Config {
            list_query_limit: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
