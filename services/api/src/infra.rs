use federation_registry::registration::{ApplicantCategory, ApplicationStatus};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_status(raw: &str) -> Result<ApplicationStatus, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => Ok(ApplicationStatus::Pending),
        "approved" => Ok(ApplicationStatus::Approved),
        "rejected" => Ok(ApplicationStatus::Rejected),
        _ => Err(format!(
            "unknown status '{raw}' (expected one of: pending, approved, rejected)"
        )),
    }
}

pub(crate) fn parse_category(raw: &str) -> Result<ApplicantCategory, String> {
    raw.parse::<ApplicantCategory>()
        .map_err(|err| err.to_string())
}
