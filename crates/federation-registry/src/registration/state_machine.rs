//! Approval lifecycle: `pending → approved`, `pending → rejected`, `rejected → pending`.
//! Approval is sticky. Transitions are pure; persisting the result is the service's job.

use chrono::{DateTime, Utc};

use super::domain::{ApplicationRecord, ApplicationStatus, ApplicationUpdate, MemberId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Approve { member_id: MemberId },
    Reject { reason: String },
    Resubmit(ApplicationUpdate),
}

impl Transition {
    pub fn action(&self) -> &'static str {
        match self {
            Transition::Approve { .. } => "approve",
            Transition::Reject { .. } => "reject",
            Transition::Resubmit(_) => "resubmit",
        }
    }

    pub fn source(&self) -> ApplicationStatus {
        match self {
            Transition::Approve { .. } | Transition::Reject { .. } => ApplicationStatus::Pending,
            Transition::Resubmit(_) => ApplicationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} an application that is {from}")]
    InvalidTransition {
        from: ApplicationStatus,
        action: &'static str,
    },
    #[error("application changed while it was being updated; it is now {current}")]
    Concurrent { current: ApplicationStatus },
    #[error("a non-empty rejection reason is required")]
    MissingReason,
}

/// Checks that `action` may start from `status` without building the next record.
pub fn ensure_source(
    status: ApplicationStatus,
    required: ApplicationStatus,
    action: &'static str,
) -> Result<(), TransitionError> {
    if status == required {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            from: status,
            action,
        })
    }
}

/// Produces the next version of `record`. The input is never modified.
pub fn apply(
    record: &ApplicationRecord,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<ApplicationRecord, TransitionError> {
    ensure_source(record.status, transition.source(), transition.action())?;

    let mut next = record.clone();
    match transition {
        Transition::Approve { member_id } => {
            next.status = ApplicationStatus::Approved;
            next.member_id = Some(member_id);
            next.rejection_reason = None;
        }
        Transition::Reject { reason } => {
            if reason.trim().is_empty() {
                return Err(TransitionError::MissingReason);
            }
            next.status = ApplicationStatus::Rejected;
            next.rejection_reason = Some(reason);
            next.member_id = None;
        }
        Transition::Resubmit(update) => {
            update.merge_into(&mut next);
            next.status = ApplicationStatus::Pending;
            next.rejection_reason = None;
            next.member_id = None;
        }
    }

    next.updated_at = now;
    next.revision = record.revision + 1;
    Ok(next)
}
