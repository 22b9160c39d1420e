use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::registration::domain::{
    ApplicantCategory, ApplicantDetails, ApplicationKey, ApplicationRecord,
    ApplicationSubmission, CategoryDetails, DocumentInput, MemberId,
};
use crate::registration::identifier::MemberIdSource;
use crate::registration::repository::{
    ApplicationFilter, ApplicationRepository, RepositoryError,
};
use crate::registration::{registration_router, RegistrationService};
use crate::storage::InMemoryApplicationRepository;

pub(super) const ADMIN_TOKEN: &str = "federation-admin";

pub(super) fn documents(slots: &[&str]) -> BTreeMap<String, DocumentInput> {
    slots
        .iter()
        .map(|slot| {
            (
                (*slot).to_string(),
                DocumentInput::Url(format!("https://files.test/uploads/{slot}.pdf")),
            )
        })
        .collect()
}

pub(super) fn applicant(email: &str) -> ApplicantDetails {
    ApplicantDetails {
        first_name: "Asha".to_string(),
        middle_name: None,
        last_name: "Rao".to_string(),
        email: email.to_string(),
        phone: "9876543210".to_string(),
        date_of_birth: Some(NaiveDate::from_ymd_opt(2008, 5, 14).expect("valid date")),
        gender: Some("female".to_string()),
        residential_address: "12 Lake Road, Pune".to_string(),
        permanent_address: None,
        district: Some("Pune".to_string()),
        aadhar_number: None,
    }
}

pub(super) fn fencer_submission(email: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        user_id: "user-asha".to_string(),
        applicant: applicant(email),
        details: CategoryDetails {
            weapon: Some("foil".to_string()),
            ..CategoryDetails::default()
        },
        documents: documents(&[
            "passportPhoto",
            "aadharFront",
            "aadharBack",
            "birthCertificate",
        ]),
    }
}

pub(super) fn club_submission(email: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        user_id: "user-club".to_string(),
        applicant: ApplicantDetails {
            date_of_birth: None,
            gender: None,
            ..applicant(email)
        },
        details: CategoryDetails {
            club_name: Some("Riposte Club".to_string()),
            ..CategoryDetails::default()
        },
        documents: documents(&["registrationCertificate", "addressProof"]),
    }
}

pub(super) fn pending_record(category: ApplicantCategory) -> ApplicationRecord {
    let submission = match category {
        ApplicantCategory::Club => club_submission("club@example.org"),
        _ => fencer_submission("asha@example.org"),
    };
    let created = Utc
        .with_ymd_and_hms(2024, 6, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp");
    ApplicationRecord::from_submission(category, submission, created)
}

pub(super) fn build_service() -> (
    RegistrationService<InMemoryApplicationRepository>,
    Arc<InMemoryApplicationRepository>,
) {
    let repository = Arc::new(InMemoryApplicationRepository::default());
    (RegistrationService::new(repository.clone()), repository)
}

pub(super) fn router_with_token(token: Option<&str>) -> axum::Router {
    let (service, _) = build_service();
    registration_router(Arc::new(service), token.map(str::to_string))
}

/// Hands out the queued identifiers in order, then repeats the last one.
pub(super) struct QueuedMemberIds {
    queue: Mutex<VecDeque<String>>,
    last: String,
}

impl QueuedMemberIds {
    pub(super) fn new(ids: &[&str]) -> Self {
        Self {
            queue: Mutex::new(ids.iter().map(|id| (*id).to_string()).collect()),
            last: ids.last().copied().unwrap_or("DAF-F00000000").to_string(),
        }
    }
}

impl MemberIdSource for QueuedMemberIds {
    fn issue(&self, _category: ApplicantCategory) -> MemberId {
        let next = self
            .queue
            .lock()
            .expect("id queue mutex poisoned")
            .pop_front();
        MemberId(next.unwrap_or_else(|| self.last.clone()))
    }
}

pub(super) struct ConflictRepository;

impl ApplicationRepository for ConflictRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn fetch(&self, _key: &ApplicationKey) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(None)
    }

    fn find_by_identity(
        &self,
        _email: &str,
        _category: ApplicantCategory,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(None)
    }

    fn update(
        &self,
        _record: ApplicationRecord,
        _expected_revision: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn member_id_in_use(&self, _member_id: &MemberId) -> Result<bool, RepositoryError> {
        Ok(false)
    }

    fn list(&self, _filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _key: &ApplicationKey) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_identity(
        &self,
        _email: &str,
        _category: ApplicantCategory,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _record: ApplicationRecord,
        _expected_revision: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn member_id_in_use(&self, _member_id: &MemberId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Behaves like the in-memory store except that every update loses the revision race.
#[derive(Default)]
pub(super) struct StaleRepository {
    pub(super) inner: InMemoryApplicationRepository,
}

impl ApplicationRepository for StaleRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn fetch(&self, key: &ApplicationKey) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(key)
    }

    fn find_by_identity(
        &self,
        email: &str,
        category: ApplicantCategory,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.find_by_identity(email, category)
    }

    fn update(
        &self,
        _record: ApplicationRecord,
        expected_revision: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::StaleRevision {
            expected: expected_revision,
            found: expected_revision + 1,
        })
    }

    fn member_id_in_use(&self, member_id: &MemberId) -> Result<bool, RepositoryError> {
        self.inner.member_id_in_use(member_id)
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.list(filter)
    }
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json payload")
}
