use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Configuration for the sentiment analyzer client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Analysis backend settings
    pub backend: BackendConfig,

    /// Cross-context messaging settings
    pub router: RouterConfig,

    /// Logging and rendering settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Base address of the analysis backend
    pub base_url: String,

    /// Upper bound for the health probe (seconds)
    pub health_timeout_seconds: u64,

    /// Upper bound for one analysis request (seconds)
    pub analyze_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Deadline for a context to answer a request (milliseconds)
    pub response_timeout_ms: u64,

    /// Inbox capacity of each context
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,

    /// Comments longer than this are truncated when rendered
    pub max_comment_chars: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            health_timeout_seconds: 3,
            // Comment download plus scoring can take a while on the backend
            analyze_timeout_seconds: 120,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5000,
            channel_capacity: 32,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_comment_chars: 200,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            router: RouterConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then the environment
    pub fn load() -> Result<Self> {
        Self::load_from(&["yt-sentiment.toml", "config/yt-sentiment.toml"])
    }

    /// The first existing file among `paths` wins; if it does not parse, that is the error
    pub fn load_from<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        match paths.iter().map(P::as_ref).find(|path| path.exists()) {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config file {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("YT_SENTIMENT_BACKEND_URL") {
            config.backend.base_url = base_url;
        }

        if let Ok(log_level) = std::env::var("YT_SENTIMENT_LOG_LEVEL") {
            config.output.log_level = log_level;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.backend.base_url)
            .map_err(|e| anyhow!("Invalid backend base_url {:?}: {}", self.backend.base_url, e))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("Backend base_url must be http or https, got {}", base.scheme()));
        }

        if self.backend.health_timeout_seconds == 0 {
            return Err(anyhow!("health_timeout_seconds must be greater than 0"));
        }

        if self.backend.analyze_timeout_seconds == 0 {
            return Err(anyhow!("analyze_timeout_seconds must be greater than 0"));
        }

        if self.router.response_timeout_ms == 0 {
            return Err(anyhow!("response_timeout_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Sentiment Analyzer Configuration:\n\
            - Backend: {}\n\
            - Health Timeout: {}s\n\
            - Analyze Timeout: {}s\n\
            - Router Deadline: {}ms",
            self.backend.base_url,
            self.backend.health_timeout_seconds,
            self.backend.analyze_timeout_seconds,
            self.router.response_timeout_ms,
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_backend_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.backend.base_url = base_url.into();
        self
    }

    pub fn with_health_timeout(mut self, seconds: u64) -> Self {
        self.config.backend.health_timeout_seconds = seconds;
        self
    }

    pub fn with_analyze_timeout(mut self, seconds: u64) -> Self {
        self.config.backend.analyze_timeout_seconds = seconds;
        self
    }

    pub fn with_router_timeout_ms(mut self, millis: u64) -> Self {
        self.config.router.response_timeout_ms = millis;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.output.log_level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
