use super::domain::{
    ApplicantCategory, ApplicationKey, ApplicationRecord, ApplicationStatus, MemberId,
};

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 500;

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Implementations give single-document atomicity: `insert` refuses a second active record
/// for the same identity, and `update` is a compare-and-swap on `revision`.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, key: &ApplicationKey) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn find_by_identity(
        &self,
        email: &str,
        category: ApplicantCategory,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn update(
        &self,
        record: ApplicationRecord,
        expected_revision: u64,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn member_id_in_use(&self, member_id: &MemberId) -> Result<bool, RepositoryError>;
    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("an active application already exists for this email and category")]
    Conflict,
    #[error("application not found")]
    NotFound,
    #[error("application revision changed (expected {expected}, found {found})")]
    StaleRevision { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Listing filter. `limit: None` returns every match; listings built through
/// [`ApplicationFilter::listing`] are always bounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub category: Option<ApplicantCategory>,
    pub limit: Option<usize>,
}

impl ApplicationFilter {
    pub fn listing(
        status: Option<ApplicationStatus>,
        category: Option<ApplicantCategory>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            status,
            category,
            limit: Some(limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)),
        }
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        self.status.map_or(true, |status| record.status == status)
            && self
                .category
                .map_or(true, |category| record.category == category)
    }

    /// Filters, orders newest first, and truncates to the limit.
    pub fn select<I>(&self, records: I) -> Vec<ApplicationRecord>
    where
        I: IntoIterator<Item = ApplicationRecord>,
    {
        let mut selected: Vec<ApplicationRecord> = records
            .into_iter()
            .filter(|record| self.matches(record))
            .collect();
        selected.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// The record that answers for an identity: an active one if present, otherwise the most
/// recently updated rejected one.
pub fn identity_record<I>(
    records: I,
    email: &str,
    category: ApplicantCategory,
) -> Option<ApplicationRecord>
where
    I: IntoIterator<Item = ApplicationRecord>,
{
    records
        .into_iter()
        .filter(|record| record.category == category && record.email() == email)
        .max_by(|a, b| {
            a.is_active()
                .cmp(&b.is_active())
                .then_with(|| a.updated_at.cmp(&b.updated_at))
        })
}
