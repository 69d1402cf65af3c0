use crate::cli::ServeArgs;
use crate::infra::{remote_api, AppState};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tribe_tally::config::AppConfig;
use tribe_tally::error::AppError;
use tribe_tally::scoring::OfficerId;
use tribe_tally::telemetry;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs, officer: Option<OfficerId>) -> Result<(), AppError> {
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

    let api = remote_api(&config.backend, officer)?;
    if !api.has_officer() {
        warn!("no officer configured; scoring routes will answer 400 until TALLY_OFFICER_ID is set");
    }

    let app = with_scoring_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        backend = %config.backend.base_url,
        "tribe tally service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
