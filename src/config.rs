//! Configuration management for the search agent.
//!
//! Configuration is read once at startup from environment variables (a `.env`
//! file, if present, is loaded into the environment first by the binary):
//! - `OPENAI_API_KEY` - Required. API key for the chat completion service.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `TAVILY_API_KEY` - Required. API key for the Tavily search service.
//! - `TAVILY_API_URL` - Optional. Defaults to `https://api.tavily.com`.
//! - `DEFAULT_MODEL` - Optional. Model used when a request omits one. Defaults to `gpt-4-turbo-preview`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `30`.
//! - `SEARCH_MAX_RESULTS` - Optional. Results per search. Defaults to `10`.
//! - `CACHE_ENABLED` - Optional. Whole-run response cache. Defaults to `true`.
//! - `CACHE_DIR` - Optional. Defaults to `./langchain_whole_chain_cache`.
//! - `CACHE_TTL_SECS` - Optional. Entry lifetime; unset keeps entries forever.
//! - `AGENT_VERBOSE` - Optional. Log every agent step at info level. Defaults to `true`.
//!
//! Host, port and log level come from the command line.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8889;
pub const DEFAULT_LOG_LEVEL: &str = "debug";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_CACHE_DIR: &str = "./langchain_whole_chain_cache";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Whole-run response cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether agent runs are memoized at all
    pub enabled: bool,

    /// Directory holding one file per cached run
    pub dir: PathBuf,

    /// Entry lifetime (None = never expire)
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            ttl: None,
        }
    }
}

/// Web search tool configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Tavily API key
    pub api_key: String,

    /// Tavily API base URL
    pub api_url: String,

    /// Maximum number of results per search
    pub max_results: u32,
}

impl SearchConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_url: "https://api.tavily.com".to_string(),
            max_results: 10,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat completion API key
    pub api_key: String,

    /// Chat completion API base URL (OpenAI-compatible)
    pub api_base_url: String,

    /// Model used when a request does not name one
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Log level name as given on the command line
    pub log_level: String,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Log each agent step at info level
    pub verbose: bool,

    /// Search tool configuration
    pub search: SearchConfig,

    /// Response cache configuration
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` or
    /// `TAVILY_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let tavily_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("TAVILY_API_KEY".to_string()))?;

        let mut config = Self::new(api_key, tavily_key);

        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = std::env::var("TAVILY_API_URL") {
            config.search.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("DEFAULT_MODEL") {
            config.default_model = model;
        }

        config.max_iterations = parse_env("MAX_ITERATIONS", config.max_iterations)?;
        if config.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        config.search.max_results = parse_env("SEARCH_MAX_RESULTS", config.search.max_results)?;

        config.verbose = std::env::var("AGENT_VERBOSE")
            .ok()
            .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue("AGENT_VERBOSE".to_string(), e)))
            .transpose()?
            .unwrap_or(true);

        config.cache.enabled = std::env::var("CACHE_ENABLED")
            .ok()
            .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue("CACHE_ENABLED".to_string(), e)))
            .transpose()?
            .unwrap_or(true);
        if let Ok(dir) = std::env::var("CACHE_DIR") {
            config.cache.dir = PathBuf::from(dir);
        }
        config.cache.ttl = std::env::var("CACHE_TTL_SECS")
            .ok()
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::InvalidValue("CACHE_TTL_SECS".to_string(), format!("{}", e)))
            })
            .transpose()?;

        Ok(config)
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String, tavily_key: String) -> Self {
        Self {
            api_key,
            api_base_url: "https://api.openai.com/v1".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            max_iterations: 30,
            verbose: true,
            search: SearchConfig::new(tavily_key),
            cache: CacheConfig::default(),
        }
    }

    /// Apply the server settings given on the command line.
    pub fn with_server(mut self, host: String, port: u16, log_level: String) -> Self {
        self.host = host;
        self.port = port;
        self.log_level = log_level;
        self
    }

    /// The default `tracing` filter for the configured log level.
    pub fn log_filter(&self) -> Result<String, ConfigError> {
        let level = tracing_level(&self.log_level)?;
        Ok(format!("search_agent={level},tower_http={level}"))
    }
}

/// Map a server log level name onto a `tracing` level directive.
///
/// Accepts the names used by common Python/ASGI servers as well as the
/// `tracing` ones.
pub fn tracing_level(name: &str) -> Result<&'static str, ConfigError> {
    match name.trim().to_lowercase().as_str() {
        "critical" | "error" => Ok("error"),
        "warning" | "warn" => Ok("warn"),
        "info" => Ok("info"),
        "debug" => Ok("debug"),
        "trace" => Ok("trace"),
        other => Err(ConfigError::InvalidValue(
            "log_level".to_string(),
            format!("unknown level: {}", other),
        )),
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
