use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::{build_router, Services};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use federation_registry::accounts::AccountService;
use federation_registry::config::AppConfig;
use federation_registry::error::AppError;
use federation_registry::payments::broker_from_config;
use federation_registry::registration::RegistrationService;
use federation_registry::storage::{JsonApplicationRepository, JsonUserRepository};
use federation_registry::telemetry;
use federation_registry::uploads::{FilesystemObjectStore, UploadGateway, UploadPolicy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir.take() {
        config.storage.data_dir = data_dir;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let storage = &config.storage;
    let applications = Arc::new(JsonApplicationRepository::open(&storage.data_dir)?);
    let users = Arc::new(JsonUserRepository::open(&storage.data_dir)?);
    let objects = Arc::new(FilesystemObjectStore::new(storage.upload_dir()));
    let upload_dir = objects.root().to_path_buf();
    let gateway = Arc::new(UploadGateway::new(
        objects,
        UploadPolicy::new(storage.upload_max_bytes),
        storage.public_base_url.clone(),
    ));
    let broker = Arc::new(broker_from_config(&config.payments)?);
    let processor = broker.processor_name();

    if config.admin.token.is_none() {
        warn!("APP_ADMIN_TOKEN is not set; administrator routes are open");
    }

    let services = Services {
        registration: Arc::new(RegistrationService::new(applications)),
        accounts: Arc::new(AccountService::new(users)),
        gateway,
        broker,
        admin_token: config.admin.token.clone(),
    };

    let app = build_router(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_dir = %config.storage.data_dir.display(),
        upload_dir = %upload_dir.display(),
        processor,
        "federation registry ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
