use super::domain::{UserAccount, UserId};

/// Account storage. `insert` enforces unique normalized emails.
pub trait UserRepository: Send + Sync {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, UserStoreError>;
    fn fetch(&self, id: &UserId) -> Result<Option<UserAccount>, UserStoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, UserStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("an account with this email already exists")]
    Conflict,
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}
