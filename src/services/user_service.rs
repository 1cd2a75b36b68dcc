use crate::config::AdminSecret;
use crate::db::now_timestamp;
use crate::models::{Gender, User, UserSummary};
use crate::repositories::{RepositoryError, UpsertUser, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const MIN_AGE: i64 = 5;
pub const MAX_AGE: i64 = 120;
pub const MAX_NAME_LEN: usize = 100;

#[allow(clippy::unwrap_used)]
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Please fill all required fields.")]
    MissingFields,
    #[error("Please enter a valid phone number.")]
    InvalidPhone,
    #[error("Age must be between 5 and 120.")]
    InvalidAge,
    #[error("Please choose a gender.")]
    InvalidGender,
    #[error("Name is too long.")]
    NameTooLong,
    #[error("Invalid admin password.")]
    InvalidAdminPassphrase,
    #[error("User not found")]
    UserNotFound,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What the login / register form submits.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub name: String,
    pub phone: String,
    pub age: i64,
    pub gender: String,
    pub admin_passphrase: Option<String>,
}

/// Checks the shared admin passphrase. Only the argon2 hash is kept.
#[derive(Clone, Default)]
pub struct AdminGate {
    hash: Option<String>,
}

impl AdminGate {
    pub fn from_secret(secret: &AdminSecret) -> Result<Self, UserServiceError> {
        match secret {
            AdminSecret::Disabled => Ok(Self::disabled()),
            AdminSecret::Plain(plain) => Ok(Self {
                hash: Some(hash_secret(plain)?),
            }),
            AdminSecret::Hash(hash) => {
                PasswordHash::new(hash)
                    .map_err(|e| UserServiceError::HashingError(e.to_string()))?;
                Ok(Self {
                    hash: Some(hash.clone()),
                })
            }
        }
    }

    pub fn disabled() -> Self {
        Self { hash: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.hash.is_some()
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let Some(hash) = self.hash.as_deref() else {
            return false;
        };
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

pub fn hash_secret(secret: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserServiceError::HashingError(e.to_string()))
}

/// Strips the separators people type into phone numbers.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect()
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
    admin_gate: AdminGate,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, admin_gate: AdminGate) -> Self {
        Self {
            repository,
            admin_gate,
        }
    }

    /// Registers a new phone number or refreshes an existing user's details.
    pub async fn login(&self, request: LoginRequest) -> Result<User, UserServiceError> {
        let name = request.name.trim();
        let phone = normalize_phone(request.phone.trim());
        let gender_raw = request.gender.trim();

        if name.is_empty() || phone.is_empty() || gender_raw.is_empty() {
            return Err(UserServiceError::MissingFields);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(UserServiceError::NameTooLong);
        }
        if !PHONE_RE.is_match(&phone) {
            return Err(UserServiceError::InvalidPhone);
        }
        if !(MIN_AGE..=MAX_AGE).contains(&request.age) {
            return Err(UserServiceError::InvalidAge);
        }
        let gender: Gender = gender_raw
            .parse()
            .map_err(|_| UserServiceError::InvalidGender)?;

        // Verified exactly as typed; the configured passphrase is hashed untrimmed.
        let grant_admin = match request.admin_passphrase.as_deref() {
            None => false,
            Some(passphrase) if passphrase.trim().is_empty() => false,
            Some(passphrase) => {
                if !self.admin_gate.verify(passphrase) {
                    tracing::warn!("Rejected admin passphrase for {}", phone);
                    return Err(UserServiceError::InvalidAdminPassphrase);
                }
                true
            }
        };

        let user = self
            .repository
            .upsert_user(&UpsertUser {
                phone,
                name: name.to_string(),
                age: request.age,
                gender: gender.as_str().to_string(),
                grant_admin,
                now: now_timestamp(),
            })
            .await?;

        tracing::info!("{} logged in as {}", user.phone, user.role_label());
        Ok(user)
    }

    pub async fn find_user(&self, phone: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_phone(phone).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<UserSummary>, UserServiceError> {
        Ok(self
            .repository
            .list_users(limit.unwrap_or(100), offset.unwrap_or(0))
            .await?)
    }

    pub async fn set_admin(&self, phone: &str, is_admin: bool) -> Result<(), UserServiceError> {
        match self.repository.set_admin(phone, is_admin).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::Repository(e)),
        }
    }

    pub async fn delete_user(&self, phone: &str) -> Result<(), UserServiceError> {
        match self.repository.delete_user(phone).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::Repository(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::MockUserRepository;

    fn request() -> LoginRequest {
        LoginRequest {
            name: "  Asha  ".to_string(),
            phone: "+91 98765-43210".to_string(),
            age: 22,
            gender: "Female".to_string(),
            admin_passphrase: None,
        }
    }

    fn stored(upsert: &UpsertUser) -> User {
        User {
            phone: upsert.phone.clone(),
            name: upsert.name.clone(),
            age: upsert.age,
            gender: upsert.gender.clone(),
            is_admin: upsert.grant_admin,
            created_at: upsert.now.clone(),
            last_login_at: upsert.now.clone(),
        }
    }

    #[tokio::test]
    async fn test_login_normalizes_input() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_upsert_user()
            .withf(|u| u.phone == "+919876543210" && u.name == "Asha" && !u.grant_admin)
            .times(1)
            .returning(|u| Ok(stored(u)));

        let service = UserService::new(Arc::new(mock_repo), AdminGate::disabled());
        let user = service.login(request()).await.expect("login should succeed");
        assert_eq!(user.phone, "+919876543210");
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn test_login_rejects_missing_fields() {
        let service = UserService::new(Arc::new(MockUserRepository::new()), AdminGate::disabled());
        let result = service
            .login(LoginRequest {
                name: "   ".to_string(),
                ..request()
            })
            .await;
        assert!(matches!(result, Err(UserServiceError::MissingFields)));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_phone_and_age() {
        let service = UserService::new(Arc::new(MockUserRepository::new()), AdminGate::disabled());

        let bad_phone = service
            .login(LoginRequest {
                phone: "call me".to_string(),
                ..request()
            })
            .await;
        assert!(matches!(bad_phone, Err(UserServiceError::InvalidPhone)));

        let too_young = service
            .login(LoginRequest {
                age: 4,
                ..request()
            })
            .await;
        assert!(matches!(too_young, Err(UserServiceError::InvalidAge)));

        let bad_gender = service
            .login(LoginRequest {
                gender: "Robot".to_string(),
                ..request()
            })
            .await;
        assert!(matches!(bad_gender, Err(UserServiceError::InvalidGender)));
    }

    #[tokio::test]
    async fn test_wrong_admin_passphrase_is_refused() {
        let gate = AdminGate::from_secret(&AdminSecret::Plain("letmein".to_string())).unwrap();
        let service = UserService::new(Arc::new(MockUserRepository::new()), gate);

        let result = service
            .login(LoginRequest {
                admin_passphrase: Some("guess".to_string()),
                ..request()
            })
            .await;
        assert!(matches!(
            result,
            Err(UserServiceError::InvalidAdminPassphrase)
        ));
    }

    #[tokio::test]
    async fn test_admin_passphrase_grants_admin() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_upsert_user()
            .withf(|u| u.grant_admin)
            .times(1)
            .returning(|u| Ok(stored(u)));

        let gate = AdminGate::from_secret(&AdminSecret::Plain("letmein".to_string())).unwrap();
        let service = UserService::new(Arc::new(mock_repo), gate);

        let user = service
            .login(LoginRequest {
                admin_passphrase: Some("letmein".to_string()),
                ..request()
            })
            .await
            .unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn test_passphrase_with_surrounding_spaces_matches_exactly() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_upsert_user()
            .withf(|u| u.grant_admin)
            .times(1)
            .returning(|u| Ok(stored(u)));

        let gate = AdminGate::from_secret(&AdminSecret::Plain(" open sesame ".to_string())).unwrap();
        let service = UserService::new(Arc::new(mock_repo), gate);

        let trimmed = service
            .login(LoginRequest {
                admin_passphrase: Some("open sesame".to_string()),
                ..request()
            })
            .await;
        assert!(matches!(
            trimmed,
            Err(UserServiceError::InvalidAdminPassphrase)
        ));

        let exact = service
            .login(LoginRequest {
                admin_passphrase: Some(" open sesame ".to_string()),
                ..request()
            })
            .await
            .unwrap();
        assert!(exact.is_admin);
    }

    #[tokio::test]
    async fn test_set_admin_unknown_user() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_set_admin()
            .withf(|phone, is_admin| phone == "+15550001111" && *is_admin)
            .times(1)
            .returning(|_, _| Err(RepositoryError::NotFound));

        let service = UserService::new(Arc::new(mock_repo), AdminGate::disabled());
        let result = service.set_admin("+15550001111", true).await;
        assert!(matches!(result, Err(UserServiceError::UserNotFound)));
    }

    #[test]
    fn admin_gate_accepts_precomputed_hash() {
        let hash = hash_secret("s3cret").unwrap();
        let gate = AdminGate::from_secret(&AdminSecret::Hash(hash)).unwrap();
        assert!(gate.verify("s3cret"));
        assert!(!gate.verify("S3cret"));
        assert!(!AdminGate::disabled().verify(""));
    }

    #[test]
    fn admin_gate_rejects_malformed_hash() {
        assert!(AdminGate::from_secret(&AdminSecret::Hash("nope".to_string())).is_err());
    }
}
