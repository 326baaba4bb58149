use crate::cli::ServeArgs;
use crate::infra::{seed_admin, AppState};
use crate::routes::with_hostel_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hostel::config::AppConfig;
use hostel::error::AppError;
use hostel::residence::{CredentialPolicy, HostelService, MemoryStore};
use hostel::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(HostelService::new(
        store,
        CredentialPolicy::new(config.security.password_cost),
    ));

    if let Some(admin) = seed_admin(&service, config.security.admin_seed.as_ref())? {
        info!(identity_id = %admin.id, username = %admin.username, "administrator available");
    }

    let app = with_hostel_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hostel service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
