//! Application configuration.

use serde::Deserialize;
use std::time::Duration;

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Application configuration.
///
/// Keys mirror the process environment (`PORT`, `DATABASE_URL`, ...), lowercased.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deployment environment.
    #[serde(default)]
    pub env: Environment,
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    /// HMAC secret for bearer tokens.
    pub jwt_secret: String,
    /// Access token lifetime in minutes.
    #[serde(default = "default_access_token_ttl")]
    pub jwt_access_token_ttl: i64,
    /// Refresh token lifetime in days.
    #[serde(default = "default_refresh_token_ttl")]
    pub jwt_refresh_token_ttl: i64,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub wasabi_access_key: Option<String>,
    #[serde(default)]
    pub wasabi_secret_key: Option<String>,
    #[serde(default)]
    pub wasabi_bucket: Option<String>,
    #[serde(default)]
    pub wasabi_region: Option<String>,
    #[serde(default)]
    pub wasabi_endpoint: Option<String>,
    /// Requests allowed per source IP within one window.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    /// Sliding window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

/// Object storage settings resolved from the `WASABI_*` keys.
#[derive(Debug, Clone)]
pub struct ObjectStorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
}

const fn default_port() -> u16 {
    8080
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_access_token_ttl() -> i64 {
    15
}

const fn default_refresh_token_ttl() -> i64 {
    7
}

const fn default_rate_limit_requests() -> u32 {
    300
}

const fn default_rate_limit_window_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `ENV`)
    /// 3. Environment variables (`PORT`, `DATABASE_URL`, `JWT_SECRET`, ...)
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(Self::environment());

        Self::build(builder)
    }

    fn environment() -> config::Environment {
        config::Environment::default()
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cors_allowed_origins")
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        let mut config: Self = builder.build()?.try_deserialize()?;
        config.cors_allowed_origins.retain(|origin| !origin.trim().is_empty());
        Ok(config)
    }

    /// Access token lifetime.
    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_access_token_ttl.max(1) as u64 * 60)
    }

    /// Refresh token lifetime.
    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_refresh_token_ttl.max(1) as u64 * 24 * 60 * 60)
    }

    /// Whether this is a production deployment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.env == Environment::Production
    }

    /// Object storage settings, if a bucket and credentials are configured.
    #[must_use]
    pub fn object_storage(&self) -> Option<ObjectStorageConfig> {
        let region = self
            .wasabi_region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());
        Some(ObjectStorageConfig {
            access_key: self.wasabi_access_key.clone()?,
            secret_key: self.wasabi_secret_key.clone()?,
            bucket: self.wasabi_bucket.clone()?,
            endpoint: self
                .wasabi_endpoint
                .clone()
                .unwrap_or_else(|| format!("https://s3.{region}.wasabisys.com")),
            region,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<Config, config::ConfigError> {
        Config::build(
            config::Config::builder().add_source(config::File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_defaults_applied() {
        let config = from_toml(
            r#"
            database_url = "postgres://localhost/huddle"
            jwt_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.access_token_ttl(), Duration::from_secs(15 * 60));
        assert_eq!(config.refresh_token_ttl(), Duration::from_secs(7 * 86_400));
        assert!(config.cors_allowed_origins.is_empty());
        assert!(config.object_storage().is_none());
    }

    #[test]
    fn test_missing_required_key_fails() {
        assert!(from_toml(r#"jwt_secret = "secret""#).is_err());
    }

    #[test]
    fn test_object_storage_resolved() {
        let config = from_toml(
            r#"
            env = "production"
            database_url = "postgres://localhost/huddle"
            jwt_secret = "secret"
            wasabi_access_key = "ak"
            wasabi_secret_key = "sk"
            wasabi_bucket = "uploads"
            wasabi_region = "ap-northeast-1"
            cors_allowed_origins = ["https://app.example.com", ""]
            "#,
        )
        .unwrap();

        assert!(config.is_production());
        assert_eq!(config.cors_allowed_origins, vec!["https://app.example.com"]);
        let storage = config.object_storage().unwrap();
        assert_eq!(storage.bucket, "uploads");
        assert_eq!(storage.endpoint, "https://s3.ap-northeast-1.wasabisys.com");
    }
}
