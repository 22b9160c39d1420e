use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;

use crate::api::{Classify, ErrorKind};
use crate::registration::checklist::plausible_email;
use crate::registration::domain::normalize_email;
use crate::registration::ApplicantCategory;

use super::domain::{NewUser, UserAccount, UserId, UserSummary};
use super::repository::{UserRepository, UserStoreError};

pub const MIN_PASSWORD_CHARS: usize = 8;

pub struct AccountService<U> {
    repository: Arc<U>,
}

impl<U> AccountService<U>
where
    U: UserRepository + 'static,
{
    pub fn new(repository: Arc<U>) -> Self {
        Self { repository }
    }

    pub fn register(&self, new_user: NewUser) -> Result<UserSummary, AccountError> {
        let missing: Vec<&'static str> = [
            ("name", new_user.name.as_str()),
            ("email", new_user.email.as_str()),
            ("password", new_user.password.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(AccountError::MissingFields(missing));
        }

        let email = normalize_email(&new_user.email);
        if !plausible_email(&email) {
            return Err(AccountError::InvalidEmail(email));
        }
        if new_user.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AccountError::WeakPassword);
        }
        if self.repository.find_by_email(&email)?.is_some() {
            return Err(AccountError::Duplicate);
        }

        let account = UserAccount {
            id: UserId::generate(),
            name: new_user.name.trim().to_string(),
            email,
            password_hash: hash_password(&new_user.password)?,
            phone: new_user.phone.filter(|value| !value.trim().is_empty()),
            district: new_user.district.filter(|value| !value.trim().is_empty()),
            role: new_user.role.unwrap_or(ApplicantCategory::Fencer),
            created_at: Utc::now(),
        };

        let stored = self.repository.insert(account)?;
        tracing::info!(user_id = %stored.id, role = %stored.role, "account registered");
        Ok(stored.summary())
    }

    pub fn get(&self, id: &UserId) -> Result<UserSummary, AccountError> {
        self.repository
            .fetch(id)?
            .map(|account| account.summary())
            .ok_or(AccountError::NotFound)
    }

    /// Summary of the account whose stored hash matches `password`. Unknown emails and wrong
    /// passwords fail the same way.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<UserSummary, AccountError> {
        let missing: Vec<&'static str> = [("email", email), ("password", password)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect();
        if !missing.is_empty() {
            return Err(AccountError::MissingFields(missing));
        }

        let Some(account) = self.repository.find_by_email(&normalize_email(email))? else {
            return Err(AccountError::InvalidCredentials);
        };
        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|err| AccountError::Hashing(err.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AccountError::InvalidCredentials)?;
        tracing::info!(user_id = %account.id, "account signed in");
        Ok(account.summary())
    }

    /// Runs `work` on the blocking pool; hashing and the stores are synchronous.
    pub async fn blocking<T, F>(self: &Arc<Self>, work: F) -> Result<T, AccountError>
    where
        F: FnOnce(&Self) -> Result<T, AccountError> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || work(&service)).await?
    }
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
    #[error("password must be at least {MIN_PASSWORD_CHARS} characters")]
    WeakPassword,
    #[error("an account with this email already exists")]
    Duplicate,
    #[error("user not found")]
    NotFound,
    #[error("email or password is incorrect")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(UserStoreError),
    #[error("account task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<UserStoreError> for AccountError {
    fn from(value: UserStoreError) -> Self {
        match value {
            UserStoreError::Conflict => AccountError::Duplicate,
            other => AccountError::Store(other),
        }
    }
}

impl Classify for AccountError {
    fn kind(&self) -> ErrorKind {
        match self {
            AccountError::MissingFields(_)
            | AccountError::InvalidEmail(_)
            | AccountError::WeakPassword => ErrorKind::Validation,
            AccountError::Duplicate => ErrorKind::Duplicate,
            AccountError::NotFound => ErrorKind::NotFound,
            AccountError::InvalidCredentials => ErrorKind::Unauthorized,
            AccountError::Hashing(_) | AccountError::Store(_) | AccountError::Worker(_) => {
                ErrorKind::Upstream
            }
        }
    }
}
