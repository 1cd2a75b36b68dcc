use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512};
use time::Duration;
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer,
};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::warn;

use super::{AppConfig, ConfigError, SessionSecret};

/// Signed-cookie session layer backed by the SQLite session table.
pub type SessionLayer = SessionManagerLayer<SqliteStore, SignedCookie>;

pub const SESSION_TABLE: &str = "sessions";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secure: bool,
    pub same_site: SameSite,
    pub expiry: Duration,
    pub name: String,
    secret: Option<SessionSecret>,
}

impl SessionConfig {
    pub fn for_app(config: &AppConfig) -> Self {
        if config.is_production() {
            SessionConfig {
                secure: true,
                same_site: SameSite::Strict,
                expiry: Duration::hours(2),
                name: "__Host-bakbak".to_string(),
                secret: config.session_secret.clone(),
            }
        } else {
            SessionConfig {
                secure: false,
                same_site: SameSite::Lax,
                expiry: Duration::days(7),
                name: "bakbak_session".to_string(),
                secret: config.session_secret.clone(),
            }
        }
    }

    pub fn create_layer(&self, store: SqliteStore) -> SessionLayer {
        SessionManagerLayer::new(store)
            .with_secure(self.secure)
            .with_http_only(true)
            .with_same_site(self.same_site)
            .with_name(self.name.clone())
            .with_expiry(Expiry::OnInactivity(self.expiry))
            .with_signed(load_session_key(self.secret.as_ref()))
    }
}

/// Refuses to start a production instance without HTTPS and a real secret.
pub fn validate_production_config(config: &AppConfig) -> Result<(), ConfigError> {
    if !config.is_production() {
        return Ok(());
    }

    if !config.force_https {
        return Err(ConfigError::Insecure(
            "production requires HTTPS, set FORCE_HTTPS=true".to_string(),
        ));
    }

    let SessionSecret(secret) = config.session_secret.as_ref().ok_or_else(|| {
        ConfigError::Insecure("SESSION_SECRET must be set in production".to_string())
    })?;

    if decode_secret_bytes(secret).len() < 64 {
        return Err(ConfigError::Insecure(
            "SESSION_SECRET must be at least 64 bytes in production".to_string(),
        ));
    }

    let lowered = secret.to_ascii_lowercase();
    if ["example", "changeme", "default"]
        .iter()
        .any(|word| lowered.contains(word))
    {
        return Err(ConfigError::Insecure(
            "SESSION_SECRET looks like a placeholder value".to_string(),
        ));
    }

    if matches!(config.admin, super::AdminSecret::Plain(_)) {
        warn!("ADMIN_PASSPHRASE is set in clear text; prefer ADMIN_PASSPHRASE_HASH");
    }

    Ok(())
}

fn load_session_key(secret: Option<&SessionSecret>) -> Key {
    match secret {
        Some(SessionSecret(secret)) => key_from_secret_bytes(&decode_secret_bytes(secret)),
        None => {
            warn!("SESSION_SECRET not set; sessions will not survive a restart");
            Key::generate()
        }
    }
}

fn decode_secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}

fn key_from_secret_bytes(bytes: &[u8]) -> Key {
    if bytes.len() >= 64 {
        Key::from(&bytes[..64])
    } else {
        let digest = Sha512::digest(bytes);
        Key::from(digest.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secrets_are_stretched_to_a_full_key() {
        let a = key_from_secret_bytes(b"short");
        let b = key_from_secret_bytes(b"short");
        assert_eq!(a.master(), b.master());
        assert_eq!(a.master().len(), 64);
    }

    #[test]
    fn development_cookies_are_lax() {
        let config = SessionConfig::for_app(&AppConfig::default());
        assert!(!config.secure);
        assert_eq!(config.same_site, SameSite::Lax);
        assert_eq!(config.name, "bakbak_session");
    }

    #[test]
    fn production_cookies_are_strict() {
        let app = AppConfig {
            environment: "production".to_string(),
            ..AppConfig::default()
        };
        let config = SessionConfig::for_app(&app);
        assert!(config.secure);
        assert_eq!(config.same_site, SameSite::Strict);
        assert_eq!(config.expiry, Duration::hours(2));
    }
}
