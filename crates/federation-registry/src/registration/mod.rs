//! Membership application intake, document checklist, and approval lifecycle.
//!
//! Records move `pending → approved | rejected` and `rejected → pending`. Approval issues a
//! category-prefixed member ID that the store has not seen before.

pub mod checklist;
pub mod domain;
pub mod export;
pub mod identifier;
pub mod repository;
pub mod router;
pub mod service;
pub mod state_machine;

#[cfg(test)]
mod tests;

pub use checklist::{mandated_slots, missing_slots, DocumentSlot, ValidationError};
pub use domain::{
    ApplicantCategory, ApplicantDetails, ApplicationKey, ApplicationRecord, ApplicationStatus,
    ApplicationStatusView, ApplicationSubmission, ApplicationUpdate, CategoryDetails,
    DocumentInput, DocumentRef, MemberId, UnknownCategory,
};
pub use identifier::{MemberIdSource, RandomMemberIds};
pub use repository::{ApplicationFilter, ApplicationRepository, RepositoryError};
pub use router::registration_router;
pub use service::{RegistrationError, RegistrationService, SubmissionOutcome};
pub use state_machine::{Transition, TransitionError};
