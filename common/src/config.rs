//! Application configuration.
//!
//! Configuration is read once at process start and passed around as an
//! immutable value. Every setting comes from the environment (optionally
//! seeded from a `.env` file).

use std::fmt;
use std::time::Duration;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 8000;
/// Default chat model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Default OpenAI-compatible API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Top-level configuration for a service process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name, used in logs and health responses.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Target database settings.
    pub database: DatabaseConfig,
    /// Chat model provider settings.
    pub llm: LlmConfig,
    /// Agent loop settings.
    pub agent: AgentConfig,
    /// Return raw error text in 500 responses instead of sanitized messages.
    pub expose_error_details: bool,
}

/// Connection settings for the fund database.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Full connection URL; when set it takes precedence over the fields above.
    pub url: Option<String>,
    /// Sample rows shown per table in schema descriptions.
    pub sample_rows: u32,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Settings for the hosted chat model.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Settings for the SQL agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub top_k: u32,
    pub read_only: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: "root".to_string(),
            database: "sba".to_string(),
            url: None,
            sample_rows: 3,
            max_connections: 1,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            top_k: 10,
            read_only: true,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Credentials are kept out of Debug output so configs can be logged.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("sample_rows", &self.sample_rows)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// A `.env` file in the working directory is applied first; variables
    /// already present in the environment win.
    pub fn load_with_service(service_name: &str) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "已加载 .env 文件");
        }
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_defaults = DatabaseConfig::default();
        let llm_defaults = LlmConfig::default();
        let agent_defaults = AgentConfig::default();

        let string = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            service_name: service_name.to_string(),
            host: string("SERVER_HOST", DEFAULT_HOST),
            port: parse_or(&lookup, "SERVER_PORT", DEFAULT_PORT),
            database: DatabaseConfig {
                host: string("DB_HOST", &db_defaults.host),
                port: parse_or(&lookup, "DB_PORT", db_defaults.port),
                username: string("DB_USER", &db_defaults.username),
                // An empty password is a legitimate value.
                password: lookup("DB_PASSWORD").unwrap_or(db_defaults.password),
                database: string("DB_NAME", &db_defaults.database),
                url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
                sample_rows: parse_or(&lookup, "DB_SAMPLE_ROWS", db_defaults.sample_rows),
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", db_defaults.max_connections)
                    .max(1),
                connect_timeout_secs: parse_or(
                    &lookup,
                    "DB_CONNECT_TIMEOUT_SECS",
                    db_defaults.connect_timeout_secs,
                ),
            },
            llm: LlmConfig {
                api_key: lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()),
                api_base: string("OPENAI_API_BASE", &llm_defaults.api_base)
                    .trim_end_matches('/')
                    .to_string(),
                model: string("OPENAI_MODEL", &llm_defaults.model),
                timeout_secs: parse_or(&lookup, "LLM_TIMEOUT_SECS", llm_defaults.timeout_secs),
            },
            agent: AgentConfig {
                max_iterations: parse_or(&lookup, "AGENT_MAX_ITERATIONS", agent_defaults.max_iterations)
                    .max(1),
                top_k: parse_or(&lookup, "AGENT_TOP_K", agent_defaults.top_k),
                read_only: parse_bool_or(&lookup, "AGENT_READ_ONLY", agent_defaults.read_only),
            },
            expose_error_details: parse_bool_or(&lookup, "EXPOSE_ERROR_DETAILS", false),
        }
    }

    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Secret values that must never reach a response body.
    pub fn secrets(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if !self.database.password.is_empty() {
            secrets.push(self.database.password.clone());
        }
        if let Some(url) = &self.database.url {
            secrets.push(url.clone());
        }
        if let Some(key) = &self.llm.api_key {
            secrets.push(key.clone());
        }
        secrets
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "配置值无法解析，使用默认值");
            default
        }),
        None => default,
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            tracing::warn!(key, value = %v, "布尔配置值无法解析，使用默认值");
            default
        }
        None => default,
    }
}
