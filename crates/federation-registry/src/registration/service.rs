use std::sync::Arc;

use chrono::Utc;

use crate::api::{Classify, ErrorKind};

use super::checklist::{self, ValidationError};
use super::domain::{
    ApplicantCategory, ApplicationKey, ApplicationRecord, ApplicationStatus,
    ApplicationSubmission, ApplicationUpdate, MemberId, normalize_email,
};
use super::export::{self, ExportError};
use super::identifier::{MemberIdSource, RandomMemberIds};
use super::repository::{ApplicationFilter, ApplicationRepository, RepositoryError};
use super::state_machine::{self, Transition, TransitionError};

pub const MAX_MEMBER_ID_ATTEMPTS: usize = 5;

/// Result of a submission: a new record, or a rejected record brought back to `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Created(ApplicationRecord),
    Resubmitted(ApplicationRecord),
}

impl SubmissionOutcome {
    pub fn record(&self) -> &ApplicationRecord {
        match self {
            SubmissionOutcome::Created(record) | SubmissionOutcome::Resubmitted(record) => record,
        }
    }

    pub fn into_record(self) -> ApplicationRecord {
        match self {
            SubmissionOutcome::Created(record) | SubmissionOutcome::Resubmitted(record) => record,
        }
    }
}

/// Registration workflow: checklist gate, record store, approval lifecycle.
pub struct RegistrationService<R> {
    repository: Arc<R>,
    ids: Arc<dyn MemberIdSource>,
}

impl<R> RegistrationService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_id_source(repository, Arc::new(RandomMemberIds))
    }

    pub fn with_id_source(repository: Arc<R>, ids: Arc<dyn MemberIdSource>) -> Self {
        Self { repository, ids }
    }

    /// Runs `work` on the blocking pool. Repositories do synchronous i/o.
    pub async fn blocking<T, F>(self: &Arc<Self>, work: F) -> Result<T, RegistrationError>
    where
        F: FnOnce(&Self) -> Result<T, RegistrationError> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || work(&service)).await?
    }

    /// Fails with a conflict when an active application already holds the identity.
    pub fn ensure_identity_free(
        &self,
        email: &str,
        category: ApplicantCategory,
    ) -> Result<(), RegistrationError> {
        match self
            .repository
            .find_by_identity(&normalize_email(email), category)?
        {
            Some(existing) if existing.is_active() => Err(RepositoryError::Conflict.into()),
            _ => Ok(()),
        }
    }

    /// Validate and persist a new application. A rejected record for the same identity is
    /// resubmitted in place instead of gaining a sibling.
    pub fn submit(
        &self,
        category: ApplicantCategory,
        submission: ApplicationSubmission,
    ) -> Result<SubmissionOutcome, RegistrationError> {
        let now = Utc::now();
        let candidate = ApplicationRecord::from_submission(category, submission.clone(), now);
        checklist::check_record(&candidate)?;

        match self
            .repository
            .find_by_identity(candidate.email(), category)?
        {
            Some(existing) if existing.is_active() => Err(RepositoryError::Conflict.into()),
            Some(existing) => {
                let mut next =
                    state_machine::apply(&existing, Transition::Resubmit(submission.into()), now)?;
                next.user_id = candidate.user_id;
                let stored = self.commit(&existing, next)?;
                tracing::info!(
                    application_id = %stored.id,
                    %category,
                    "rejected application resubmitted"
                );
                Ok(SubmissionOutcome::Resubmitted(stored))
            }
            None => {
                let stored = self.repository.insert(candidate)?;
                tracing::info!(application_id = %stored.id, %category, "application submitted");
                Ok(SubmissionOutcome::Created(stored))
            }
        }
    }

    pub fn get(&self, key: &ApplicationKey) -> Result<ApplicationRecord, RegistrationError> {
        let record = self
            .repository
            .fetch(key)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// `pending → approved`, issuing a member ID not yet held by another record.
    pub fn approve(&self, key: &ApplicationKey) -> Result<ApplicationRecord, RegistrationError> {
        let current = self.get(key)?;
        state_machine::ensure_source(current.status, ApplicationStatus::Pending, "approve")?;

        let member_id = self.issue_member_id(current.category)?;
        let next = state_machine::apply(&current, Transition::Approve { member_id }, Utc::now())?;
        let stored = self.commit(&current, next)?;
        tracing::info!(
            application_id = %stored.id,
            member_id = stored.member_id.as_ref().map(MemberId::as_str).unwrap_or_default(),
            "application approved"
        );
        Ok(stored)
    }

    /// `pending → rejected` with a mandatory reason stored verbatim.
    pub fn reject(
        &self,
        key: &ApplicationKey,
        reason: String,
    ) -> Result<ApplicationRecord, RegistrationError> {
        if reason.trim().is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }

        let current = self.get(key)?;
        let next = state_machine::apply(&current, Transition::Reject { reason }, Utc::now())?;
        let stored = self.commit(&current, next)?;
        tracing::info!(application_id = %stored.id, "application rejected");
        Ok(stored)
    }

    /// `rejected → pending` with a partial update. The merged record must pass the checklist.
    pub fn resubmit(
        &self,
        key: &ApplicationKey,
        update: ApplicationUpdate,
    ) -> Result<ApplicationRecord, RegistrationError> {
        let current = self.get(key)?;
        let next = state_machine::apply(&current, Transition::Resubmit(update), Utc::now())?;
        checklist::check_record(&next)?;
        let stored = self.commit(&current, next)?;
        tracing::info!(application_id = %stored.id, "application resubmitted");
        Ok(stored)
    }

    pub fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationRecord>, RegistrationError> {
        Ok(self.repository.list(filter)?)
    }

    /// CSV export of every record matching the filter.
    pub fn export_csv(&self, filter: &ApplicationFilter) -> Result<Vec<u8>, RegistrationError> {
        let records = self.repository.list(filter)?;
        Ok(export::to_csv_bytes(&records)?)
    }

    fn issue_member_id(&self, category: ApplicantCategory) -> Result<MemberId, RegistrationError> {
        for attempt in 1..=MAX_MEMBER_ID_ATTEMPTS {
            let candidate = self.ids.issue(category);
            if !self.repository.member_id_in_use(&candidate)? {
                return Ok(candidate);
            }
            tracing::warn!(%candidate, attempt, "member id already issued, drawing again");
        }
        Err(RegistrationError::IdentifiersExhausted {
            attempts: MAX_MEMBER_ID_ATTEMPTS,
        })
    }

    /// Compare-and-swap against the revision `current` was read at. A lost race reports the
    /// state the record moved to.
    fn commit(
        &self,
        current: &ApplicationRecord,
        next: ApplicationRecord,
    ) -> Result<ApplicationRecord, RegistrationError> {
        match self.repository.update(next, current.revision) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::StaleRevision { expected, found }) => {
                let latest = self
                    .repository
                    .fetch(&current.id)?
                    .ok_or(RepositoryError::NotFound)?;
                tracing::warn!(
                    application_id = %current.id,
                    expected,
                    found,
                    "concurrent update lost"
                );
                Err(TransitionError::Concurrent {
                    current: latest.status,
                }
                .into())
            }
            Err(other) => Err(other.into()),
        }
    }
}

/// Error raised by the registration service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("could not issue a unique member id after {attempts} attempts")]
    IdentifiersExhausted { attempts: usize },
    #[error("registration task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl Classify for RegistrationError {
    fn kind(&self) -> ErrorKind {
        match self {
            RegistrationError::Validation(_) => ErrorKind::Validation,
            RegistrationError::Transition(TransitionError::MissingReason) => ErrorKind::Validation,
            RegistrationError::Transition(_) => ErrorKind::InvalidTransition,
            RegistrationError::Repository(RepositoryError::Conflict) => ErrorKind::Duplicate,
            RegistrationError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            RegistrationError::Repository(RepositoryError::StaleRevision { .. }) => {
                ErrorKind::InvalidTransition
            }
            RegistrationError::Repository(RepositoryError::Unavailable(_))
            | RegistrationError::Export(_)
            | RegistrationError::IdentifiersExhausted { .. }
            | RegistrationError::Worker(_) => ErrorKind::Upstream,
        }
    }
}
