use crate::cli::ServeArgs;
use crate::infra::{build_dispatcher, open_store, AppState, OutboxChannel};
use crate::routes::with_conversation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use courier_intake::config::AppConfig;
use courier_intake::error::AppError;
use courier_intake::telemetry;
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

    let store = open_store(&config.storage).await?;
    let outbox = Arc::new(OutboxChannel::default());
    let dispatcher = Arc::new(build_dispatcher(
        config.intake.moderator,
        config.intake_settings(),
        store,
        outbox.clone(),
    ));

    let app = with_conversation_routes(dispatcher, outbox)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        moderator = %config.intake.moderator,
        edit_policy = ?config.intake.edit_policy,
        "courier intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
