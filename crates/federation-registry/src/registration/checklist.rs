use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{ApplicantCategory, ApplicationRecord, DocumentRef};

/// Named document type an application may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentSlot {
    PassportPhoto,
    AadharFront,
    AadharBack,
    BirthCertificate,
    CoachingCertificate,
    RefereeCertificate,
    AffiliationCertificate,
    AuthorizationLetter,
    RegistrationCertificate,
    AddressProof,
}

impl DocumentSlot {
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentSlot::PassportPhoto => "passportPhoto",
            DocumentSlot::AadharFront => "aadharFront",
            DocumentSlot::AadharBack => "aadharBack",
            DocumentSlot::BirthCertificate => "birthCertificate",
            DocumentSlot::CoachingCertificate => "coachingCertificate",
            DocumentSlot::RefereeCertificate => "refereeCertificate",
            DocumentSlot::AffiliationCertificate => "affiliationCertificate",
            DocumentSlot::AuthorizationLetter => "authorizationLetter",
            DocumentSlot::RegistrationCertificate => "registrationCertificate",
            DocumentSlot::AddressProof => "addressProof",
        }
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const INDIVIDUAL_IDENTITY: [DocumentSlot; 3] = [
    DocumentSlot::PassportPhoto,
    DocumentSlot::AadharFront,
    DocumentSlot::AadharBack,
];

const FENCER_SLOTS: [DocumentSlot; 4] = [
    INDIVIDUAL_IDENTITY[0],
    INDIVIDUAL_IDENTITY[1],
    INDIVIDUAL_IDENTITY[2],
    DocumentSlot::BirthCertificate,
];
const COACH_SLOTS: [DocumentSlot; 4] = [
    INDIVIDUAL_IDENTITY[0],
    INDIVIDUAL_IDENTITY[1],
    INDIVIDUAL_IDENTITY[2],
    DocumentSlot::CoachingCertificate,
];
const REFEREE_SLOTS: [DocumentSlot; 4] = [
    INDIVIDUAL_IDENTITY[0],
    INDIVIDUAL_IDENTITY[1],
    INDIVIDUAL_IDENTITY[2],
    DocumentSlot::RefereeCertificate,
];
const SCHOOL_SLOTS: [DocumentSlot; 2] = [
    DocumentSlot::AffiliationCertificate,
    DocumentSlot::AuthorizationLetter,
];
const CLUB_SLOTS: [DocumentSlot; 2] = [
    DocumentSlot::RegistrationCertificate,
    DocumentSlot::AddressProof,
];

/// Document slots that must be present before an application of `category` is accepted.
pub fn mandated_slots(category: ApplicantCategory) -> &'static [DocumentSlot] {
    match category {
        ApplicantCategory::Fencer => &FENCER_SLOTS,
        ApplicantCategory::Coach => &COACH_SLOTS,
        ApplicantCategory::Referee => &REFEREE_SLOTS,
        ApplicantCategory::School => &SCHOOL_SLOTS,
        ApplicantCategory::Club => &CLUB_SLOTS,
    }
}

/// Mandated slots that are absent or carry a blank URL, in declaration order.
pub fn missing_slots(
    category: ApplicantCategory,
    documents: &BTreeMap<String, DocumentRef>,
) -> Vec<DocumentSlot> {
    mandated_slots(category)
        .iter()
        .copied()
        .filter(|slot| {
            documents
                .get(slot.as_str())
                .map_or(true, DocumentRef::is_blank)
        })
        .collect()
}

/// Rejections raised before a record may be created or changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("missing required documents: {}", join_slots(.0))]
    MissingDocuments(Vec<DocumentSlot>),
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
    #[error("a non-empty rejection reason is required")]
    EmptyReason,
    #[error("invalid request body: {0}")]
    Malformed(String),
}

fn join_slots(slots: &[DocumentSlot]) -> String {
    slots
        .iter()
        .map(|slot| slot.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn blank_opt(value: Option<&str>) -> bool {
    value.map_or(true, blank)
}

/// Required fields for the record's category that are empty.
pub fn missing_fields(record: &ApplicationRecord) -> Vec<&'static str> {
    let applicant = &record.applicant;
    let details = &record.details;
    let category = record.category;

    let mut missing = Vec::new();
    let mut require = |absent: bool, field: &'static str| {
        if absent {
            missing.push(field);
        }
    };

    require(blank(&record.user_id), "userId");
    require(blank(&applicant.first_name), "firstName");
    require(blank(&applicant.last_name), "lastName");
    require(blank(&applicant.email), "email");
    require(blank(&applicant.phone), "phone");
    require(blank(&applicant.residential_address), "residentialAddress");
    require(
        category.is_individual() && applicant.date_of_birth.is_none(),
        "dateOfBirth",
    );
    require(
        category == ApplicantCategory::Coach && blank_opt(details.training_center.as_deref()),
        "trainingCenter",
    );
    require(
        category == ApplicantCategory::School && blank_opt(details.school_name.as_deref()),
        "schoolName",
    );
    require(
        category == ApplicantCategory::Club && blank_opt(details.club_name.as_deref()),
        "clubName",
    );

    missing
}

pub(crate) fn plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Runs the field check, then the document checklist.
pub fn check_record(record: &ApplicationRecord) -> Result<(), ValidationError> {
    let fields = missing_fields(record);
    if !fields.is_empty() {
        return Err(ValidationError::MissingFields(fields));
    }

    if !plausible_email(record.email()) {
        return Err(ValidationError::InvalidEmail(record.email().to_string()));
    }

    let slots = missing_slots(record.category, &record.documents);
    if !slots.is_empty() {
        return Err(ValidationError::MissingDocuments(slots));
    }

    Ok(())
}
