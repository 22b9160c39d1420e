//! User accounts referenced by applications through `userId`.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{NewUser, UserAccount, UserId, UserSummary};
pub use repository::{UserRepository, UserStoreError};
pub use router::accounts_router;
pub use service::{AccountError, AccountService};
