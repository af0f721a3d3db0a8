use crate::proxy::types::{ProxyConfig, RequestSizeLimit, DEFAULT_MAX_BODY_SIZE};
use crate::proxy::url_resolver::UrlResolver;
use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `EGRESS_PROXY__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "EGRESS_PROXY";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub proxy: ProxySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    pub request_timeout_ms: u64,
    pub max_body_size: usize,
    /// Fixed base URL; switches the proxy into fixed-target mode when set
    #[serde(default)]
    pub target_host: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load settings, taking environment overrides from `env_override`
    /// instead of the process environment when given.
    pub fn load(env_override: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("proxy.request_timeout_ms", 30_000)?
            .set_default("proxy.max_body_size", DEFAULT_MAX_BODY_SIZE as u64)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env_override),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate and freeze the proxy section for the pipeline
    pub fn proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        let max_request_size = RequestSizeLimit::try_new(self.proxy.max_body_size)
            .map_err(|e| ConfigError::Message(format!("proxy.max_body_size: {e}")))?;

        if self.proxy.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "proxy.request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let target_host = self
            .proxy
            .target_host
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|base| {
                UrlResolver::parse_base(base)
                    .map_err(|e| ConfigError::Message(format!("proxy.target_host: {e}")))
            })
            .transpose()?;

        Ok(ProxyConfig {
            max_request_size,
            request_timeout: Duration::from_millis(self.proxy.request_timeout_ms),
            target_host,
        })
    }
}
