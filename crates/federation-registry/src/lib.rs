//! Membership registration service for a regional fencing federation.
//!
//! Applicants register an account, submit a category-specific application with supporting
//! documents, and administrators approve or reject it. Approval issues a member identifier;
//! the registration fee is collected through an external payment processor.

pub mod accounts;
pub mod api;
pub mod config;
pub mod error;
pub mod ingress;
pub mod payments;
pub mod registration;
pub mod storage;
pub mod telemetry;
pub mod uploads;
