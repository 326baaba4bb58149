use hostel::config::AdminSeed;
use hostel::residence::{HostelService, HostelServiceError, HostelStore, Identity};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Create the configured administrator unless one with that username already exists.
pub(crate) fn seed_admin<S>(
    service: &HostelService<S>,
    seed: Option<&AdminSeed>,
) -> Result<Option<Identity>, HostelServiceError>
where
    S: HostelStore + 'static,
{
    seed.map(|seed| service.ensure_staff(&seed.username, &seed.email, &seed.password))
        .transpose()
}
