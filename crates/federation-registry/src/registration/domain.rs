use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::uploads::StoredAssetRef;

/// Membership category an applicant registers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicantCategory {
    Fencer,
    Coach,
    Referee,
    School,
    Club,
}

impl ApplicantCategory {
    pub const ALL: [ApplicantCategory; 5] = [
        ApplicantCategory::Fencer,
        ApplicantCategory::Coach,
        ApplicantCategory::Referee,
        ApplicantCategory::School,
        ApplicantCategory::Club,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicantCategory::Fencer => "fencer",
            ApplicantCategory::Coach => "coach",
            ApplicantCategory::Referee => "referee",
            ApplicantCategory::School => "school",
            ApplicantCategory::Club => "club",
        }
    }

    /// Collection name used in registration paths, e.g. `/coaches/register`.
    pub const fn plural(self) -> &'static str {
        match self {
            ApplicantCategory::Fencer => "fencers",
            ApplicantCategory::Coach => "coaches",
            ApplicantCategory::Referee => "referees",
            ApplicantCategory::School => "schools",
            ApplicantCategory::Club => "clubs",
        }
    }

    pub const fn member_id_prefix(self) -> &'static str {
        match self {
            ApplicantCategory::Fencer => "DAF-F",
            ApplicantCategory::Coach => "DAF-C",
            ApplicantCategory::Referee => "DAF-R",
            ApplicantCategory::School => "DAF-S",
            ApplicantCategory::Club => "DAF-CL",
        }
    }

    /// Individuals carry a date of birth; institutions do not.
    pub const fn is_individual(self) -> bool {
        matches!(
            self,
            ApplicantCategory::Fencer | ApplicantCategory::Coach | ApplicantCategory::Referee
        )
    }
}

impl fmt::Display for ApplicantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown applicant category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for ApplicantCategory {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ApplicantCategory::ALL
            .into_iter()
            .find(|category| category.label() == normalized || category.plural() == normalized)
            .ok_or_else(|| UnknownCategory(value.to_string()))
    }
}

/// Storage key of an application record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationKey(pub String);

impl ApplicationKey {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Federation membership number issued on approval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reference to an uploaded document held on an application. Never carries bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl DocumentRef {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: None,
            original_name: None,
            content_type: None,
            size: None,
            uploaded_at: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.url.trim().is_empty()
    }
}

impl From<StoredAssetRef> for DocumentRef {
    fn from(asset: StoredAssetRef) -> Self {
        Self {
            url: asset.url,
            key: Some(asset.key),
            original_name: Some(asset.original_name),
            content_type: Some(asset.content_type),
            size: Some(asset.size),
            uploaded_at: Some(asset.uploaded_at),
        }
    }
}

/// Clients send either a bare URL or the asset reference returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentInput {
    Url(String),
    Reference(DocumentRef),
}

impl From<DocumentInput> for DocumentRef {
    fn from(input: DocumentInput) -> Self {
        match input {
            DocumentInput::Url(url) => DocumentRef::from_url(url),
            DocumentInput::Reference(reference) => reference,
        }
    }
}

pub(crate) fn collect_documents(
    documents: BTreeMap<String, DocumentInput>,
) -> BTreeMap<String, DocumentRef> {
    documents
        .into_iter()
        .map(|(slot, input)| (slot.trim().to_string(), DocumentRef::from(input)))
        .collect()
}

/// Identity and contact fields shared by every category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicantDetails {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    pub residential_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permanent_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhar_number: Option<String>,
}

impl ApplicantDetails {
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Category-specific fields. Which ones are required depends on the category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coach_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certification_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_of_experience: Option<u8>,
}

/// Inbound application payload for `POST /{category}/register`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSubmission {
    #[serde(default)]
    pub user_id: String,
    #[serde(flatten)]
    pub applicant: ApplicantDetails,
    #[serde(flatten)]
    pub details: CategoryDetails,
    #[serde(default)]
    pub documents: BTreeMap<String, DocumentInput>,
}

/// Partial update applied when a rejected applicant resubmits. Absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicationUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub residential_address: Option<String>,
    pub permanent_address: Option<String>,
    pub district: Option<String>,
    pub aadhar_number: Option<String>,
    pub coach_name: Option<String>,
    pub training_center: Option<String>,
    pub weapon: Option<String>,
    pub school_name: Option<String>,
    pub club_name: Option<String>,
    pub affiliation_number: Option<String>,
    pub principal_name: Option<String>,
    pub certification_level: Option<String>,
    pub years_of_experience: Option<u8>,
    pub documents: BTreeMap<String, DocumentInput>,
}

fn overwrite(target: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        *target = value;
    }
}

fn overwrite_optional<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl ApplicationUpdate {
    pub(crate) fn merge_into(self, record: &mut ApplicationRecord) {
        let applicant = &mut record.applicant;
        overwrite(&mut applicant.first_name, self.first_name);
        overwrite_optional(&mut applicant.middle_name, self.middle_name);
        overwrite(&mut applicant.last_name, self.last_name);
        overwrite(&mut applicant.phone, self.phone);
        overwrite_optional(&mut applicant.date_of_birth, self.date_of_birth);
        overwrite_optional(&mut applicant.gender, self.gender);
        overwrite(&mut applicant.residential_address, self.residential_address);
        overwrite_optional(&mut applicant.permanent_address, self.permanent_address);
        overwrite_optional(&mut applicant.district, self.district);
        overwrite_optional(&mut applicant.aadhar_number, self.aadhar_number);

        let details = &mut record.details;
        overwrite_optional(&mut details.coach_name, self.coach_name);
        overwrite_optional(&mut details.training_center, self.training_center);
        overwrite_optional(&mut details.weapon, self.weapon);
        overwrite_optional(&mut details.school_name, self.school_name);
        overwrite_optional(&mut details.club_name, self.club_name);
        overwrite_optional(&mut details.affiliation_number, self.affiliation_number);
        overwrite_optional(&mut details.principal_name, self.principal_name);
        overwrite_optional(&mut details.certification_level, self.certification_level);
        overwrite_optional(&mut details.years_of_experience, self.years_of_experience);

        for (slot, reference) in collect_documents(self.documents) {
            if !reference.is_blank() {
                record.documents.insert(slot, reference);
            }
        }
    }
}

impl From<ApplicationSubmission> for ApplicationUpdate {
    fn from(submission: ApplicationSubmission) -> Self {
        let ApplicationSubmission {
            applicant,
            details,
            documents,
            ..
        } = submission;

        Self {
            first_name: non_blank(applicant.first_name),
            middle_name: applicant.middle_name,
            last_name: non_blank(applicant.last_name),
            phone: non_blank(applicant.phone),
            date_of_birth: applicant.date_of_birth,
            gender: applicant.gender,
            residential_address: non_blank(applicant.residential_address),
            permanent_address: applicant.permanent_address,
            district: applicant.district,
            aadhar_number: applicant.aadhar_number,
            coach_name: details.coach_name,
            training_center: details.training_center,
            weapon: details.weapon,
            school_name: details.school_name,
            club_name: details.club_name,
            affiliation_number: details.affiliation_number,
            principal_name: details.principal_name,
            certification_level: details.certification_level,
            years_of_experience: details.years_of_experience,
            documents,
        }
    }
}

/// Durable application record. One per (email, category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: ApplicationKey,
    pub user_id: String,
    pub category: ApplicantCategory,
    #[serde(flatten)]
    pub applicant: ApplicantDetails,
    #[serde(flatten)]
    pub details: CategoryDetails,
    pub documents: BTreeMap<String, DocumentRef>,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<MemberId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

impl ApplicationRecord {
    /// Builds a fresh `pending` record from a submission.
    pub fn from_submission(
        category: ApplicantCategory,
        submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Self {
        let ApplicationSubmission {
            user_id,
            mut applicant,
            details,
            documents,
        } = submission;
        applicant.email = normalize_email(&applicant.email);

        Self {
            id: ApplicationKey::generate(),
            user_id: user_id.trim().to_string(),
            category,
            applicant,
            details,
            documents: collect_documents(documents),
            status: ApplicationStatus::Pending,
            rejection_reason: None,
            member_id: None,
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }

    pub fn email(&self) -> &str {
        &self.applicant.email
    }

    pub fn is_active(&self) -> bool {
        self.status != ApplicationStatus::Rejected
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            id: self.id.clone(),
            category: self.category,
            status: self.status,
            member_id: self.member_id.clone(),
            rejection_reason: self.rejection_reason.clone(),
            submitted_documents: self.documents.keys().cloned().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Applicant-facing projection of a record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusView {
    pub id: ApplicationKey,
    pub category: ApplicantCategory,
    pub status: ApplicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<MemberId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub submitted_documents: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
