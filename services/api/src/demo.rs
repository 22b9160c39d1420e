use chrono::NaiveDate;
use clap::Args;
use federation_registry::accounts::{AccountService, NewUser, UserSummary};
use federation_registry::error::AppError;
use federation_registry::payments::{
    OrderContext, PaymentBroker, SyntheticProcessor, WebhookVerifier,
};
use federation_registry::registration::{
    ApplicantCategory, ApplicationFilter, ApplicationRecord, ApplicationSubmission,
    ApplicationUpdate, DocumentInput, DocumentRef, RegistrationService,
};
use federation_registry::storage::{InMemoryApplicationRepository, InMemoryUserRepository};
use federation_registry::uploads::{
    IncomingFile, InMemoryObjectStore, UploadGateway, UploadPolicy,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const DEMO_BASE_URL: &str = "http://localhost:3000";
const REGISTRATION_FEE: f64 = 500.0;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Email address used for the demo fencer.
    #[arg(long, default_value = "asha.rao@example.org")]
    pub(crate) email: String,
    /// Skip the payment portion of the demo.
    #[arg(long)]
    pub(crate) skip_payment: bool,
    /// Print the CSV export at the end of the demo.
    #[arg(long)]
    pub(crate) show_export: bool,
}

struct DemoStack {
    accounts: AccountService<InMemoryUserRepository>,
    registration: RegistrationService<InMemoryApplicationRepository>,
    gateway: UploadGateway<InMemoryObjectStore>,
}

impl DemoStack {
    fn new() -> Self {
        Self {
            accounts: AccountService::new(Arc::new(InMemoryUserRepository::default())),
            registration: RegistrationService::new(Arc::new(
                InMemoryApplicationRepository::default(),
            )),
            gateway: UploadGateway::new(
                Arc::new(InMemoryObjectStore::default()),
                UploadPolicy::new(1024 * 1024),
                DEMO_BASE_URL,
            ),
        }
    }

    async fn upload(
        &self,
        slots: &[(&str, &str, &str)],
    ) -> Result<BTreeMap<String, DocumentInput>, AppError> {
        let mut documents = BTreeMap::new();
        for (slot, file_name, content_type) in slots {
            let asset = self
                .gateway
                .upload(IncomingFile {
                    file_name: (*file_name).to_string(),
                    content_type: Some((*content_type).to_string()),
                    bytes: format!("demo scan of {file_name}").into_bytes(),
                })
                .await
                .map_err(|err| demo_failure(format!("upload of {slot} failed: {err}")))?;
            println!("  uploaded {slot:<18} -> {}", asset.url);
            documents.insert(
                (*slot).to_string(),
                DocumentInput::Reference(DocumentRef::from(asset)),
            );
        }
        Ok(documents)
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        email,
        skip_payment,
        show_export,
    } = args;
    let stack = DemoStack::new();

    println!("Federation registry demo");

    println!("\n1. Account registration");
    let account = stack
        .accounts
        .register(NewUser {
            name: "Asha Rao".to_string(),
            email: email.clone(),
            password: "riposte-2024".to_string(),
            phone: Some("9876543210".to_string()),
            district: Some("Pune".to_string()),
            role: Some(ApplicantCategory::Fencer),
        })
        .map_err(|err| demo_failure(format!("account registration failed: {err}")))?;
    println!("  user {} registered as {}", account.id, account.role);
    let signed_in = stack
        .accounts
        .authenticate(&email, "riposte-2024")
        .map_err(|err| demo_failure(format!("sign-in failed: {err}")))?;
    println!("  signed in as {}", signed_in.email);

    println!("\n2. Document uploads");
    let mut documents = stack
        .upload(&[
            ("passportPhoto", "passport.jpg", "image/jpeg"),
            ("aadharFront", "aadhar-front.jpg", "image/jpeg"),
            ("aadharBack", "aadhar-back.jpg", "image/jpeg"),
        ])
        .await?;

    println!("\n3. Submission without a birth certificate");
    let incomplete = fencer_submission(&account, documents.clone());
    match stack
        .registration
        .submit(ApplicantCategory::Fencer, incomplete)
    {
        Ok(outcome) => println!("  unexpectedly accepted: {}", outcome.record().id),
        Err(err) => println!("  refused: {err}"),
    }

    println!("\n4. Complete submission");
    documents.extend(
        stack
            .upload(&[("birthCertificate", "birth-certificate.pdf", "application/pdf")])
            .await?,
    );
    let record = stack
        .registration
        .submit(
            ApplicantCategory::Fencer,
            fencer_submission(&account, documents),
        )?
        .into_record();
    print_record("submitted", &record);

    println!("\n5. Administrator approval");
    let approved = stack.registration.approve(&record.id)?;
    print_record("approved", &approved);

    println!("\n6. Rejection and resubmission");
    let coach = stack.registration.submit(
        ApplicantCategory::Coach,
        coach_submission(
            &account,
            stack
                .upload(&[
                    ("passportPhoto", "passport.jpg", "image/jpeg"),
                    ("aadharFront", "aadhar-front.jpg", "image/jpeg"),
                    ("aadharBack", "aadhar-back.jpg", "image/jpeg"),
                    ("coachingCertificate", "nis-level-1.pdf", "application/pdf"),
                ])
                .await?,
        ),
    )?;
    let rejected = stack
        .registration
        .reject(&coach.record().id, "Coaching certificate has expired".to_string())?;
    print_record("rejected", &rejected);
    let update = ApplicationUpdate {
        documents: stack
            .upload(&[("coachingCertificate", "nis-level-2.pdf", "application/pdf")])
            .await?,
        ..ApplicationUpdate::default()
    };
    let resubmitted = stack.registration.resubmit(&rejected.id, update)?;
    print_record("resubmitted", &resubmitted);

    if !skip_payment {
        println!("\n7. Registration fee");
        run_payment(&account).await?;
    }

    let on_file = stack.registration.list(&ApplicationFilter::default())?;
    println!("\nApplications on file: {}", on_file.len());
    if show_export {
        let csv = stack.registration.export_csv(&ApplicationFilter::default())?;
        println!("\n{}", String::from_utf8_lossy(&csv));
    }

    Ok(())
}

async fn run_payment(account: &UserSummary) -> Result<(), AppError> {
    let broker = PaymentBroker::new(
        Arc::new(SyntheticProcessor::default()),
        WebhookVerifier::new(None),
        format!("{DEMO_BASE_URL}/payments/return"),
        format!("{DEMO_BASE_URL}/payments/webhook"),
    );
    let session = broker
        .create_session(OrderContext {
            order_amount: REGISTRATION_FEE,
            customer_name: account.name.clone(),
            customer_email: account.email.clone(),
            customer_phone: account.phone.clone().unwrap_or_default(),
            customer_id: Some(account.id.to_string()),
            ..OrderContext::default()
        })
        .await?;
    println!(
        "  {} session {} for {:.2} {} via {}",
        session.status, session.order_id, session.amount, session.currency, session.processor
    );
    if let Some(url) = &session.redirect_url {
        println!("  redirect: {url}");
    }

    let view = broker.verify(&session.order_id).await?;
    println!("  verified status: {}", view.status);
    Ok(())
}

fn fencer_submission(
    account: &UserSummary,
    documents: BTreeMap<String, DocumentInput>,
) -> ApplicationSubmission {
    let mut submission = ApplicationSubmission {
        user_id: account.id.to_string(),
        documents,
        ..ApplicationSubmission::default()
    };
    let applicant = &mut submission.applicant;
    applicant.first_name = "Asha".to_string();
    applicant.last_name = "Rao".to_string();
    applicant.email = account.email.clone();
    applicant.phone = "9876543210".to_string();
    applicant.date_of_birth = date(2008, 5, 14);
    applicant.residential_address = "12 Lake Road, Pune".to_string();
    applicant.district = account.district.clone();
    submission.details.weapon = Some("sabre".to_string());
    submission
}

fn coach_submission(
    account: &UserSummary,
    documents: BTreeMap<String, DocumentInput>,
) -> ApplicationSubmission {
    let mut submission = fencer_submission(account, documents);
    submission.applicant.date_of_birth = date(1990, 2, 3);
    submission.details.weapon = None;
    submission.details.training_center = Some("Balewadi Sports Complex".to_string());
    submission.details.years_of_experience = Some(6);
    submission
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn print_record(label: &str, record: &ApplicationRecord) {
    let member_id = record
        .member_id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {label:<12} {} {:<8} status={:<9} member={member_id}",
        record.id, record.category, record.status
    );
    if let Some(reason) = &record.rejection_reason {
        println!("  {:<12} reason: {reason}", "");
    }
}

fn demo_failure(message: String) -> AppError {
    AppError::Io(std::io::Error::other(message))
}
