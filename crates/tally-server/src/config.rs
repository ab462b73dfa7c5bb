//! Server configuration file management.
//!
//! Read from `$TALLY_CONFIG`, else `$TALLY_DATA_DIR/config.toml`, else
//! `./tally.toml`. A missing file means defaults. `TALLY_DATA_DIR`,
//! `TALLY_JWT_SECRET` and `TALLY_BIND` override the file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_core::IdentitySettings;
use tally_crypto::jwt::MIN_SECRET_LEN;
use tally_crypto::password::HashParams;

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Origins allowed by CORS.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding `tally.db`. Empty = current directory.
    #[serde(default)]
    pub data_dir: String,
}

/// Token signing, lifetimes and password hashing cost.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret. Required, at least 32 bytes.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: u64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: u64,
    #[serde(default = "default_password_reset_minutes")]
    pub password_reset_minutes: u64,
    #[serde(default = "default_email_verification_hours")]
    pub email_verification_hours: u64,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
}

/// Read-through cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false every lookup goes to the database.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_user_ttl_minutes")]
    pub user_ttl_minutes: u64,
    #[serde(default = "default_balance_ttl_minutes")]
    pub balance_ttl_minutes: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_issuer() -> String {
    "tally".to_string()
}

fn default_audience() -> String {
    "tally-clients".to_string()
}

fn default_access_token_minutes() -> u64 {
    60
}

fn default_refresh_token_days() -> u64 {
    7
}

fn default_password_reset_minutes() -> u64 {
    60
}

fn default_email_verification_hours() -> u64 {
    24
}

fn default_hash_memory_kib() -> u32 {
    HashParams::default().memory_kib
}

fn default_hash_iterations() -> u32 {
    HashParams::default().iterations
}

fn default_hash_parallelism() -> u32 {
    HashParams::default().parallelism
}

fn default_true() -> bool {
    true
}

fn default_user_ttl_minutes() -> u64 {
    30
}

fn default_balance_ttl_minutes() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_issuer(),
            audience: default_audience(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
            password_reset_minutes: default_password_reset_minutes(),
            email_verification_hours: default_email_verification_hours(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish_non_exhaustive()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_ttl_minutes: default_user_ttl_minutes(),
            balance_ttl_minutes: default_balance_ttl_minutes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AuthConfig {
    pub fn access_ttl_secs(&self) -> u64 {
        self.access_token_minutes * 60
    }

    pub fn identity_settings(&self) -> IdentitySettings {
        IdentitySettings {
            refresh_ttl_secs: self.refresh_token_days * 86_400,
            password_reset_ttl_secs: self.password_reset_minutes * 60,
            email_verification_ttl_secs: self.email_verification_hours * 3_600,
            hash_params: HashParams {
                memory_kib: self.hash_memory_kib,
                iterations: self.hash_iterations,
                parallelism: self.hash_parallelism,
            },
        }
    }
}

impl CacheConfig {
    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_minutes * 60)
    }

    pub fn balance_ttl(&self) -> Duration {
        Duration::from_secs(self.balance_ttl_minutes * 60)
    }
}

impl ServerConfig {
    /// Load from the config file location and apply environment overrides.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay `TALLY_*` variables resolved through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("TALLY_DATA_DIR") {
            self.database.data_dir = dir;
        }
        if let Some(secret) = lookup("TALLY_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(bind) = lookup("TALLY_BIND") {
            self.server.bind = bind;
        }
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes");
        }
        let lifetimes = [
            ("auth.access_token_minutes", self.auth.access_token_minutes),
            ("auth.refresh_token_days", self.auth.refresh_token_days),
            ("auth.password_reset_minutes", self.auth.password_reset_minutes),
            ("auth.email_verification_hours", self.auth.email_verification_hours),
            ("cache.user_ttl_minutes", self.cache.user_ttl_minutes),
            ("cache.balance_ttl_minutes", self.cache.balance_ttl_minutes),
        ];
        for (name, value) in lifetimes {
            if value == 0 {
                anyhow::bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    /// Directory holding the database.
    pub fn data_dir(&self) -> PathBuf {
        if self.database.data_dir.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&self.database.data_dir)
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("tally.db")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TALLY_CONFIG") {
            return PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("TALLY_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        PathBuf::from("tally.toml")
    }
}
