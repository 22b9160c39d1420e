use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::accounts::{UserAccount, UserId, UserRepository, UserStoreError};
use crate::registration::repository::identity_record;
use crate::registration::{
    ApplicantCategory, ApplicationFilter, ApplicationKey, ApplicationRecord,
    ApplicationRepository, MemberId, RepositoryError,
};

/// Process-local application store for demos and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationKey, ApplicationRecord>>>,
}

impl InMemoryApplicationRepository {
    fn records(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ApplicationKey, ApplicationRecord>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".into()))
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records()?;
        let existing = identity_record(guard.values().cloned(), record.email(), record.category);
        if existing.is_some_and(|existing| existing.is_active()) || guard.contains_key(&record.id)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, key: &ApplicationKey) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.records()?.get(key).cloned())
    }

    fn find_by_identity(
        &self,
        email: &str,
        category: ApplicantCategory,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records()?;
        Ok(identity_record(guard.values().cloned(), email, category))
    }

    fn update(
        &self,
        record: ApplicationRecord,
        expected_revision: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records()?;
        let current = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
        if current.revision != expected_revision {
            return Err(RepositoryError::StaleRevision {
                expected: expected_revision,
                found: current.revision,
            });
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn member_id_in_use(&self, member_id: &MemberId) -> Result<bool, RepositoryError> {
        Ok(self
            .records()?
            .values()
            .any(|record| record.member_id.as_ref() == Some(member_id)))
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records()?;
        Ok(filter.select(guard.values().cloned()))
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    accounts: Arc<Mutex<HashMap<UserId, UserAccount>>>,
}

impl InMemoryUserRepository {
    fn accounts(&self) -> Result<MutexGuard<'_, HashMap<UserId, UserAccount>>, UserStoreError> {
        self.accounts
            .lock()
            .map_err(|_| UserStoreError::Unavailable("account mutex poisoned".into()))
    }
}

impl UserRepository for InMemoryUserRepository {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, UserStoreError> {
        let mut guard = self.accounts()?;
        if guard.values().any(|existing| existing.email == account.email) {
            return Err(UserStoreError::Conflict);
        }
        guard.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    fn fetch(&self, id: &UserId) -> Result<Option<UserAccount>, UserStoreError> {
        Ok(self.accounts()?.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, UserStoreError> {
        Ok(self
            .accounts()?
            .values()
            .find(|account| account.email == email)
            .cloned())
    }
}
