use crate::cli::ServeArgs;
use crate::infra::{counter_service, seed_from_csv, AppState};
use crate::routes::with_package_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use parcel_ops::config::AppConfig;
use parcel_ops::error::AppError;
use parcel_ops::telemetry;
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

    let counter = counter_service(config.counter);
    if let Some(path) = args.seed_legacy.take() {
        let summary = seed_from_csv(&counter, &path).await?;
        info!(
            path = %path.display(),
            imported = summary.imported,
            skipped = summary.skipped,
            "store seeded from legacy export"
        );
    }

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        counter: counter.clone(),
    };

    let app = with_package_routes(counter)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "parcel counter service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
