//! Per-session CSRF tokens for the HTML forms.
//!
//! Every form embeds the session token in a hidden `csrf_token` field. A
//! token is valid for 24 hours and is replaced as soon as it has been used.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CSRF_TOKEN_KEY: &str = "csrf_token";
pub const CSRF_FIELD: &str = "csrf_token";
const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfToken {
    pub value: String,
    pub created_at: i64,
}

impl CsrfToken {
    pub fn new() -> Self {
        Self {
            value: Uuid::new_v4().simple().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() - self.created_at > TOKEN_TTL_SECS
    }

    fn matches(&self, candidate: &str) -> bool {
        // Length first, then every byte, so the comparison time does not
        // depend on where the first mismatch is.
        self.value.len() == candidate.len()
            && self
                .value
                .bytes()
                .zip(candidate.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl Default for CsrfToken {
    fn default() -> Self {
        Self::new()
    }
}

async fn issue(session: &Session) -> Result<String, tower_sessions::session::Error> {
    let token = CsrfToken::new();
    let value = token.value.clone();
    session.insert(CSRF_TOKEN_KEY, token).await?;
    Ok(value)
}

/// Token to embed in the next rendered form.
pub async fn get_or_create_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    match session.get::<CsrfToken>(CSRF_TOKEN_KEY).await? {
        Some(token) if !token.is_expired() => Ok(token.value),
        _ => issue(session).await,
    }
}

/// Checks a submitted token and rotates it on success.
pub async fn verify_csrf_token(session: &Session, submitted: &str) -> bool {
    let stored = match session.get::<CsrfToken>(CSRF_TOKEN_KEY).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!("Form submitted without a CSRF token in session");
            return false;
        }
        Err(e) => {
            warn!("Failed to read CSRF token from session: {}", e);
            return false;
        }
    };

    if stored.is_expired() || !stored.matches(submitted) {
        warn!("Rejected stale or mismatched CSRF token");
        return false;
    }

    debug!("CSRF token accepted, rotating");
    if let Err(e) = issue(session).await {
        warn!("Failed to rotate CSRF token: {}", e);
    }
    true
}
