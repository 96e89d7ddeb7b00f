//! Environment-driven configuration

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::{AssistError, Result};

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 5000;

/// Default store location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///app.db";

/// Default llama.cpp install directory
pub const DEFAULT_LLAMA_PATH: &str = "/opt/llama.cpp";

/// Default model weights
pub const DEFAULT_MODEL_PATH: &str = "/opt/llama.cpp/models/llama-3-8b-instruct.Q4_K_M.gguf";

/// Longest accepted session lifetime (one leap year)
pub const MAX_SESSION_LIFETIME_HOURS: u64 = 24 * 366;

/// String that must not leak through `Debug` output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AssistConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Key used to sign session cookies
    pub secret_key: Secret,

    /// True when `secret_key` was generated for this process only
    pub secret_key_generated: bool,

    /// Persistent store connection string
    pub database_url: String,

    /// Session configuration
    pub session: SessionSettings,

    /// External model process configuration
    pub model: ModelSettings,

    /// Optional document sources
    pub integrations: IntegrationSettings,

    /// Logging configuration
    pub logging: LogSettings,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secret_key: Secret::new(random_secret()),
            secret_key_generated: true,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session: SessionSettings::default(),
            model: ModelSettings::default(),
            integrations: IntegrationSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

impl AssistConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };
        let mut config = Self::default();

        if let Some(host) = env.string("HOST") {
            config.host = host;
        }
        if let Some(port) = env.parse::<u16>("PORT")? {
            config.port = port;
        }
        if let Some(secret) = env.string("SECRET_KEY") {
            config.secret_key = Secret::new(secret);
            config.secret_key_generated = false;
        }
        if let Some(url) = env.string("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(hours) = env.parse::<u64>("SESSION_LIFETIME_HOURS")? {
            if hours == 0 {
                return Err(AssistError::config("SESSION_LIFETIME_HOURS must be positive"));
            }
            if hours > MAX_SESSION_LIFETIME_HOURS {
                return Err(AssistError::config(format!(
                    "SESSION_LIFETIME_HOURS must be at most {MAX_SESSION_LIFETIME_HOURS}"
                )));
            }
            config.session.lifetime_secs = hours
                .checked_mul(3600)
                .ok_or_else(|| AssistError::config("SESSION_LIFETIME_HOURS is too large"))?;
        }
        config.session.cookie_secure = env.flag("SESSION_COOKIE_SECURE");

        if let Some(dir) = env.string("LLAMA_PATH") {
            config.model.executable = PathBuf::from(&dir).join("main");
        }
        if let Some(exec) = env.string("LLAMA_EXEC_PATH") {
            config.model.executable = PathBuf::from(exec);
        }
        if let Some(model) = env.string("MODEL_PATH") {
            config.model.model_path = PathBuf::from(model);
        }
        if let Some(ctx) = env.parse::<u32>("CONTEXT_SIZE")? {
            config.model.context_size = ctx;
        }
        if let Some(temp) = env.parse::<f32>("TEMPERATURE")? {
            config.model.temperature = temp;
        }
        if let Some(max) = env.parse::<u32>("MAX_TOKENS")? {
            config.model.max_tokens = max;
        }
        config.model.timeout_secs = env.parse::<u64>("LLAMA_TIMEOUT_SECS")?.filter(|s| *s > 0);

        if let Some(level) = env.string("LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        config.logging.file = env.string("LOG_FILE").map(PathBuf::from);

        let repo = &mut config.integrations.document_repository;
        repo.enabled = env.flag("SHAREPOINT_ENABLED");
        repo.token_url = env.string("SHAREPOINT_URL");
        repo.site_url = env.string("SHAREPOINT_SITE");
        repo.client_id = env.string("SHAREPOINT_CLIENT_ID");
        repo.client_secret = env.string("SHAREPOINT_CLIENT_SECRET").map(Secret::new);

        let share = &mut config.integrations.file_share;
        share.enabled = env.flag("FILESERVER_ENABLED");
        share.host = env.string("FILESERVER_HOST");
        share.share = env.string("FILESERVER_SHARE");
        share.mount = env.string("FILESERVER_MOUNT").map(PathBuf::from);
        share.user = env.string("FILESERVER_USER");
        share.domain = env.string("FILESERVER_DOMAIN");

        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_secret_key(mut self, secret: impl Into<String>) -> Self {
        self.secret_key = Secret::new(secret);
        self.secret_key_generated = false;
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AssistError::config(format!("invalid bind address {}:{}: {e}", self.host, self.port)))
    }

    /// Resolve `database_url` into a store location
    pub fn store_location(&self) -> Result<StoreLocation> {
        StoreLocation::parse(&self.database_url)
    }
}

/// Where the SQLite store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

impl StoreLocation {
    /// Accepts `sqlite:///path`, `sqlite://path`, `sqlite::memory:` or a bare path
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AssistError::config("DATABASE_URL is empty"));
        }
        if matches!(url, "sqlite::memory:" | "sqlite://:memory:" | ":memory:") {
            return Ok(Self::Memory);
        }
        if let Some(path) = url.strip_prefix("sqlite:///") {
            return Ok(Self::File(PathBuf::from(path)));
        }
        if let Some(path) = url.strip_prefix("sqlite://") {
            return Ok(Self::File(PathBuf::from(path)));
        }
        if url.contains("://") {
            return Err(AssistError::config(format!(
                "unsupported DATABASE_URL scheme: {url}"
            )));
        }
        Ok(Self::File(PathBuf::from(url)))
    }
}

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Absolute session lifetime in seconds
    pub lifetime_secs: u64,

    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lifetime_secs: 8 * 3600,
            cookie_secure: false,
        }
    }
}

/// External model process settings
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Inference executable
    pub executable: PathBuf,

    /// Model weights file
    pub model_path: PathBuf,

    /// Context window (`-c`)
    pub context_size: u32,

    /// Sampling temperature (`-t` and `--temp`)
    pub temperature: f32,

    /// Generation limit (`-n`)
    pub max_tokens: u32,

    /// `--repeat_penalty`
    pub repeat_penalty: f32,

    /// Kill the process after this many seconds; `None` waits forever
    pub timeout_secs: Option<u64>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_LLAMA_PATH).join("main"),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            context_size: 4096,
            temperature: 0.7,
            max_tokens: 1024,
            repeat_penalty: 1.1,
            timeout_secs: None,
        }
    }
}

impl ModelSettings {
    /// Sanity-check the model settings before serving traffic
    pub fn validate(&self) -> Result<()> {
        if !self.model_path.exists() {
            return Err(AssistError::config(format!(
                "model path not found: {}",
                self.model_path.display()
            )));
        }
        if !(512..=8192).contains(&self.context_size) {
            return Err(AssistError::config(format!(
                "context size {} must be between 512 and 8192",
                self.context_size
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AssistError::config(format!(
                "temperature {} must be between 0.0 and 2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(AssistError::config("max tokens must be positive"));
        }
        Ok(())
    }
}

/// Optional document source settings
#[derive(Debug, Clone, Default)]
pub struct IntegrationSettings {
    pub document_repository: DocumentRepositorySettings,
    pub file_share: FileShareSettings,
}

/// SharePoint document repository
#[derive(Debug, Clone, Default)]
pub struct DocumentRepositorySettings {
    pub enabled: bool,
    /// OAuth client-credentials token endpoint
    pub token_url: Option<String>,
    /// Site base URL, e.g. `https://corp.sharepoint.com/sites/intranet`
    pub site_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret>,
}

impl DocumentRepositorySettings {
    pub fn is_configured(&self) -> bool {
        self.token_url.is_some()
            && self.site_url.is_some()
            && self.client_id.is_some()
            && self.client_secret.is_some()
    }
}

/// Network file share, reached through its local mount point
#[derive(Debug, Clone, Default)]
pub struct FileShareSettings {
    pub enabled: bool,
    pub host: Option<String>,
    pub share: Option<String>,
    /// Where `//host/share` is mounted on this machine
    pub mount: Option<PathBuf>,
    pub user: Option<String>,
    pub domain: Option<String>,
}

impl FileShareSettings {
    pub fn is_configured(&self) -> bool {
        self.mount.is_some()
    }

    /// `//host/share` for log lines
    pub fn unc_name(&self) -> String {
        match (&self.host, &self.share) {
            (Some(host), Some(share)) => format!("//{host}/{share}"),
            _ => self
                .mount
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// `EnvFilter` directive
    pub level: String,

    /// Optional log file, written in addition to stderr
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.string(key) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| AssistError::config(format!("{key} has an invalid value: {raw}"))),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.string(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
            .unwrap_or(false)
    }
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AssistConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.session.lifetime_secs, 8 * 3600);
        assert_eq!(config.model.max_tokens, 1024);
        assert_eq!(config.model.executable, PathBuf::from("/opt/llama.cpp/main"));
        assert!(config.secret_key_generated);
        assert_eq!(config.secret_key.expose().len(), 64);
        assert!(!config.integrations.document_repository.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let config = AssistConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("SECRET_KEY", "s3cret"),
            ("LLAMA_PATH", "/srv/llama"),
            ("CONTEXT_SIZE", "2048"),
            ("TEMPERATURE", "0.2"),
            ("SESSION_LIFETIME_HOURS", "1"),
            ("FILESERVER_ENABLED", "Yes"),
            ("FILESERVER_MOUNT", "/mnt/docs"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.secret_key.expose(), "s3cret");
        assert!(!config.secret_key_generated);
        assert_eq!(config.model.executable, PathBuf::from("/srv/llama/main"));
        assert_eq!(config.model.context_size, 2048);
        assert_eq!(config.session.lifetime_secs, 3600);
        assert!(config.integrations.file_share.enabled);
        assert!(config.integrations.file_share.is_configured());
    }

    #[test]
    fn test_exec_path_overrides_llama_dir() {
        let config = AssistConfig::from_lookup(lookup(&[
            ("LLAMA_PATH", "/srv/llama"),
            ("LLAMA_EXEC_PATH", "/usr/local/bin/llama-cli"),
        ]))
        .unwrap();
        assert_eq!(config.model.executable, PathBuf::from("/usr/local/bin/llama-cli"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = AssistConfig::from_lookup(lookup(&[("CONTEXT_SIZE", "big")])).unwrap_err();
        assert!(matches!(err, AssistError::InvalidConfig(_)));
    }

    #[test]
    fn test_oversized_session_lifetime_is_rejected() {
        for hours in ["10000000000", "18446744073709551615", "8785"] {
            let err = AssistConfig::from_lookup(lookup(&[("SESSION_LIFETIME_HOURS", hours)]))
                .unwrap_err();
            assert!(matches!(err, AssistError::InvalidConfig(_)), "{hours}");
        }

        let config = AssistConfig::from_lookup(lookup(&[("SESSION_LIFETIME_HOURS", "8784")])).unwrap();
        assert_eq!(config.session.lifetime_secs, MAX_SESSION_LIFETIME_HOURS * 3600);
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = AssistConfig::default().with_secret_key("hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_store_location_parsing() {
        assert_eq!(
            StoreLocation::parse("sqlite:///app.db").unwrap(),
            StoreLocation::File(PathBuf::from("app.db"))
        );
        assert_eq!(
            StoreLocation::parse("sqlite:////var/lib/assist.db").unwrap(),
            StoreLocation::File(PathBuf::from("/var/lib/assist.db"))
        );
        assert_eq!(StoreLocation::parse("sqlite::memory:").unwrap(), StoreLocation::Memory);
        assert!(StoreLocation::parse("postgres://db/assist").is_err());
    }

    #[test]
    fn test_model_validation() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("model.gguf");
        std::fs::write(&weights, b"gguf").unwrap();

        let mut model = ModelSettings {
            model_path: weights,
            ..ModelSettings::default()
        };
        assert!(model.validate().is_ok());

        model.context_size = 128;
        assert!(model.validate().is_err());

        model.context_size = 4096;
        model.temperature = 3.5;
        assert!(model.validate().is_err());

        let missing = ModelSettings::default();
        assert!(missing.validate().is_err());
    }
}
