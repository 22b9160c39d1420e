use crate::infra::{parse_category, parse_status};
use clap::Args;
use federation_registry::config::AppConfig;
use federation_registry::error::AppError;
use federation_registry::registration::{
    ApplicantCategory, ApplicationFilter, ApplicationStatus, RegistrationService,
};
use federation_registry::storage::JsonApplicationRepository;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct ExportArgs {
    /// Only export applications in this status (pending, approved, rejected)
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<ApplicationStatus>,
    /// Only export applications of this category (singular or plural)
    #[arg(long, value_parser = parse_category)]
    pub(crate) category: Option<ApplicantCategory>,
    /// Write the CSV to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Read the document store from this directory instead of APP_DATA_DIR
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => AppConfig::load()?.storage.data_dir,
    };
    let filter = ApplicationFilter {
        status: args.status,
        category: args.category,
        limit: None,
    };

    let csv = export_from(&data_dir, &filter)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, &csv)?;
            eprintln!("Wrote {} bytes to {}", csv.len(), path.display());
        }
        None => std::io::stdout().write_all(&csv)?,
    }
    Ok(())
}

fn export_from(data_dir: &Path, filter: &ApplicationFilter) -> Result<Vec<u8>, AppError> {
    let repository = Arc::new(JsonApplicationRepository::open(data_dir)?);
    let service = RegistrationService::new(repository);
    Ok(service.export_csv(filter)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use federation_registry::registration::{ApplicationRepository, ApplicationSubmission};
    use serde_json::json;

    fn club(email: &str) -> ApplicationSubmission {
        serde_json::from_value(json!({
            "userId": "user-club",
            "firstName": "Kiran",
            "lastName": "Patil",
            "email": email,
            "phone": "9876500000",
            "residentialAddress": "Shivaji Nagar, Pune",
            "clubName": "Riposte Club",
            "documents": {
                "registrationCertificate": "https://files.test/uploads/reg.pdf",
                "addressProof": "https://files.test/uploads/address.pdf"
            }
        }))
        .expect("submission")
    }

    #[test]
    fn export_writes_filtered_rows_to_file() {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let service = RegistrationService::new(Arc::new(
            JsonApplicationRepository::open(data_dir.path()).expect("open store"),
        ));
        let approved = service
            .submit(ApplicantCategory::Club, club("one@example.org"))
            .expect("submit")
            .into_record();
        service
            .submit(ApplicantCategory::Club, club("two@example.org"))
            .expect("submit");
        service.approve(&approved.id).expect("approve");

        let output = data_dir.path().join("approved.csv");
        run_export(ExportArgs {
            status: Some(ApplicationStatus::Approved),
            category: Some(ApplicantCategory::Club),
            output: Some(output.clone()),
            data_dir: Some(data_dir.path().to_path_buf()),
        })
        .expect("export runs");

        let text = std::fs::read_to_string(output).expect("csv written");
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("one@example.org"));
        assert!(!text.contains("two@example.org"));
        let stored = JsonApplicationRepository::open(data_dir.path())
            .expect("reopen store")
            .list(&ApplicationFilter::default())
            .expect("list");
        assert_eq!(stored.len(), 2);
    }
}
