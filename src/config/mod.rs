pub mod session;

use std::{env, net::SocketAddr, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0}")]
    Insecure(String),
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/bakbak.db";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;
pub const DEFAULT_ASSEMBLYAI_BASE_URL: &str = "https://api.assemblyai.com";

/// Runtime settings, read once at startup from the process environment
/// (after `.env` has been loaded).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub admin: AdminSecret,
    pub assemblyai_api_key: Option<String>,
    pub assemblyai_base_url: String,
    /// Signing secret for session cookies, raw or base64.
    pub session_secret: Option<SessionSecret>,
    pub force_https: bool,
}

#[derive(Clone)]
pub struct SessionSecret(pub String);

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionSecret(***)")
    }
}

/// How the admin passphrase is supplied. A pre-computed argon2 hash wins
/// over a plain passphrase when both are set.
#[derive(Clone, Default)]
pub enum AdminSecret {
    #[default]
    Disabled,
    Plain(String),
    Hash(String),
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminSecret::Disabled => write!(f, "Disabled"),
            AdminSecret::Plain(_) => write!(f, "Plain(***)"),
            AdminSecret::Hash(_) => write!(f, "Hash(***)"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port_raw = env_or("PORT", "8080");
        let port = port_raw
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port_raw.clone(),
            })?;

        let max_upload_bytes = match non_empty_var("MAX_UPLOAD_MB") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|mb| *mb > 0)
                .and_then(|mb| mb.checked_mul(1024 * 1024))
                .ok_or(ConfigError::InvalidValue {
                    key: "MAX_UPLOAD_MB",
                    value: raw,
                })?,
            None => DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        };

        let admin = match (
            non_empty_var("ADMIN_PASSPHRASE_HASH"),
            non_empty_var("ADMIN_PASSPHRASE"),
        ) {
            (Some(hash), _) => AdminSecret::Hash(hash),
            (None, Some(plain)) => AdminSecret::Plain(plain),
            (None, None) => AdminSecret::Disabled,
        };

        Ok(Self {
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "127.0.0.1"),
            port,
            database_url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            max_upload_bytes,
            admin,
            assemblyai_api_key: non_empty_var("ASSEMBLYAI_API_KEY"),
            assemblyai_base_url: env_or("ASSEMBLYAI_BASE_URL", DEFAULT_ASSEMBLYAI_BASE_URL),
            session_secret: non_empty_var("SESSION_SECRET").map(SessionSecret),
            force_https: env_flag_enabled("FORCE_HTTPS"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "HOST",
                value: self.host.clone(),
            })?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            admin: AdminSecret::Disabled,
            assemblyai_api_key: None,
            assemblyai_base_url: DEFAULT_ASSEMBLYAI_BASE_URL.to_string(),
            session_secret: None,
            force_https: false,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    non_empty_var(key).unwrap_or_else(|| default.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag_enabled(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_development() {
        let config = AppConfig::default();
        assert!(!config.is_production());
        assert_eq!(config.max_upload_mb(), 100);
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[test]
    fn admin_secret_debug_hides_value() {
        let secret = AdminSecret::Plain("hunter2".to_string());
        assert_eq!(format!("{:?}", secret), "Plain(***)");
    }

    #[test]
    fn session_secret_debug_hides_value() {
        let config = AppConfig {
            session_secret: Some(SessionSecret("top-secret".to_string())),
            ..AppConfig::default()
        };
        assert!(!format!("{:?}", config).contains("top-secret"));
    }

    #[test]
    fn bad_host_is_reported() {
        let config = AppConfig {
            host: "not-an-ip".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.socket_addr(),
            Err(ConfigError::InvalidValue { key: "HOST", .. })
        ));
    }
}
