use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingMailer, LoggingPushGateway};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mealshare::clock::SystemClock;
use mealshare::config::AppConfig;
use mealshare::error::AppError;
use mealshare::telemetry;
use mealshare::workflows::donation::InMemoryMarketplace;
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

    let marketplace = Arc::new(InMemoryMarketplace::in_memory(
        Arc::new(LoggingPushGateway),
        Arc::new(LoggingMailer),
        Arc::new(SystemClock),
        &config,
    ));
    let sweeper = marketplace.sweeper.clone().spawn();

    let app = with_operational_routes(marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sweep_interval_minutes = config.sweeper.interval_minutes,
        "food marketplace ready"
    );

    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;
    Ok(())
}
