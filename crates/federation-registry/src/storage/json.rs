use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::accounts::{UserAccount, UserId, UserRepository, UserStoreError};
use crate::registration::repository::identity_record;
use crate::registration::{
    ApplicantCategory, ApplicationFilter, ApplicationKey, ApplicationRecord,
    ApplicationRepository, MemberId, RepositoryError,
};

use super::document::{DocumentCollection, StorageError};

pub const APPLICATIONS_COLLECTION: &str = "applications";
pub const USERS_COLLECTION: &str = "users";

impl From<StorageError> for RepositoryError {
    fn from(value: StorageError) -> Self {
        RepositoryError::Unavailable(value.to_string())
    }
}

impl From<StorageError> for UserStoreError {
    fn from(value: StorageError) -> Self {
        UserStoreError::Unavailable(value.to_string())
    }
}

/// Application records as JSON documents under `{data_dir}/applications`.
///
/// Identity and member-id lookups go through indexes built when the store is opened; listings
/// read the directory. Inserts and compare-and-swap updates hold the index lock, so only one
/// process may own a data directory.
#[derive(Debug)]
pub struct JsonApplicationRepository {
    documents: DocumentCollection<ApplicationRecord>,
    indexes: Mutex<Indexes>,
}

#[derive(Debug, Default)]
struct Indexes {
    identities: HashMap<(String, ApplicantCategory), BTreeSet<ApplicationKey>>,
    member_ids: HashSet<MemberId>,
}

impl Indexes {
    fn build(records: Vec<ApplicationRecord>) -> Self {
        let mut indexes = Self::default();
        for record in &records {
            indexes.track(record);
        }
        indexes
    }

    fn track(&mut self, record: &ApplicationRecord) {
        self.identities
            .entry((record.email().to_string(), record.category))
            .or_default()
            .insert(record.id.clone());
        if let Some(member_id) = &record.member_id {
            self.member_ids.insert(member_id.clone());
        }
    }
}

impl JsonApplicationRepository {
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let documents = DocumentCollection::open(data_dir.join(APPLICATIONS_COLLECTION))?;
        let indexes = Indexes::build(documents.scan()?);
        Ok(Self {
            documents,
            indexes: Mutex::new(indexes),
        })
    }

    fn indexes(&self) -> Result<MutexGuard<'_, Indexes>, RepositoryError> {
        self.indexes
            .lock()
            .map_err(|_| RepositoryError::Unavailable("application store lock poisoned".into()))
    }

    fn indexed_identity(
        &self,
        indexes: &Indexes,
        email: &str,
        category: ApplicantCategory,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let Some(keys) = indexes.identities.get(&(email.to_string(), category)) else {
            return Ok(None);
        };
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.fetch(key)? {
                records.push(record);
            }
        }
        Ok(identity_record(records, email, category))
    }
}

impl ApplicationRepository for JsonApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut indexes = self.indexes()?;
        let existing = self.indexed_identity(&indexes, record.email(), record.category)?;
        if existing.is_some_and(|existing| existing.is_active()) {
            return Err(RepositoryError::Conflict);
        }
        self.documents.put(record.id.as_str(), &record)?;
        indexes.track(&record);
        Ok(record)
    }

    fn fetch(&self, key: &ApplicationKey) -> Result<Option<ApplicationRecord>, RepositoryError> {
        match self.documents.get(key.as_str()) {
            Ok(record) => Ok(record),
            Err(StorageError::InvalidId(_)) => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    fn find_by_identity(
        &self,
        email: &str,
        category: ApplicantCategory,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let indexes = self.indexes()?;
        self.indexed_identity(&indexes, email, category)
    }

    fn update(
        &self,
        record: ApplicationRecord,
        expected_revision: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut indexes = self.indexes()?;
        let current = self
            .fetch(&record.id)?
            .ok_or(RepositoryError::NotFound)?;
        if current.revision != expected_revision {
            return Err(RepositoryError::StaleRevision {
                expected: expected_revision,
                found: current.revision,
            });
        }
        self.documents.put(record.id.as_str(), &record)?;
        indexes.track(&record);
        Ok(record)
    }

    fn member_id_in_use(&self, member_id: &MemberId) -> Result<bool, RepositoryError> {
        Ok(self.indexes()?.member_ids.contains(member_id))
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(filter.select(self.documents.scan()?))
    }
}

/// User accounts as JSON documents under `{data_dir}/users`, with an email index built at open.
#[derive(Debug)]
pub struct JsonUserRepository {
    documents: DocumentCollection<UserAccount>,
    emails: Mutex<HashMap<String, UserId>>,
}

impl JsonUserRepository {
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let documents = DocumentCollection::open(data_dir.join(USERS_COLLECTION))?;
        let emails = documents
            .scan()?
            .into_iter()
            .map(|account: UserAccount| (account.email, account.id))
            .collect();
        Ok(Self {
            documents,
            emails: Mutex::new(emails),
        })
    }

    fn emails(&self) -> Result<MutexGuard<'_, HashMap<String, UserId>>, UserStoreError> {
        self.emails
            .lock()
            .map_err(|_| UserStoreError::Unavailable("account store lock poisoned".into()))
    }
}

impl UserRepository for JsonUserRepository {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, UserStoreError> {
        let mut emails = self.emails()?;
        if emails.contains_key(&account.email) {
            return Err(UserStoreError::Conflict);
        }
        self.documents.put(account.id.as_str(), &account)?;
        emails.insert(account.email.clone(), account.id.clone());
        Ok(account)
    }

    fn fetch(&self, id: &UserId) -> Result<Option<UserAccount>, UserStoreError> {
        match self.documents.get(id.as_str()) {
            Ok(account) => Ok(account),
            Err(StorageError::InvalidId(_)) => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, UserStoreError> {
        let id = self.emails()?.get(email).cloned();
        match id {
            Some(id) => self.fetch(&id),
            None => Ok(None),
        }
    }
}
