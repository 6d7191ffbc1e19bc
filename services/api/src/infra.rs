use metrics_exporter_prometheus::PrometheusHandle;
use parcel_ops::config::CounterConfig;
use parcel_ops::error::AppError;
use parcel_ops::packages::{
    ImportSummary, LegacyImporter, MemoryPackageStore, PackageService, Period,
};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type CounterService = PackageService<MemoryPackageStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) counter: Arc<CounterService>,
}

/// Counter service over a fresh in-process store.
pub(crate) fn counter_service(config: CounterConfig) -> Arc<CounterService> {
    Arc::new(PackageService::new(
        Arc::new(MemoryPackageStore::new()),
        config,
    ))
}

pub(crate) async fn seed_from_csv(
    service: &CounterService,
    path: &Path,
) -> Result<ImportSummary, AppError> {
    let writes = LegacyImporter::from_path(path)?;
    Ok(service.import_legacy(writes).await?)
}

pub(crate) fn parse_month(raw: &str) -> Result<Period, String> {
    Period::from_month(raw).map_err(|err| err.to_string())
}
