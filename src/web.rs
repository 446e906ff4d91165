//! Axum-based control API with OpenAPI (utoipa) and Swagger UI

use crate::config::Config;
use crate::device::{DeviceCommand, DeviceStatePort};
use crate::error::PowersaveError;
use crate::mirror::{DeviceMirror, DeviceSnapshot};
use crate::pricing::{PriceTable, SelectedHours, selected_prices};
use crate::scheduler::{PriceScheduler, SchedulerStatus};
use crate::settings::{SettingsHandle, ThresholdConfig};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: SettingsHandle,
    pub device: Arc<dyn DeviceStatePort>,
    pub selection_rx: watch::Receiver<Arc<SelectedHours>>,
    pub table_rx: watch::Receiver<Option<Arc<PriceTable>>>,
    pub scheduler_rx: watch::Receiver<Arc<SchedulerStatus>>,
    pub snapshot_rx: watch::Receiver<Arc<DeviceSnapshot>>,
    pub status_tx: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        settings: SettingsHandle,
        device: Arc<dyn DeviceStatePort>,
        scheduler: &PriceScheduler,
        mirror: &DeviceMirror,
        status_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            config,
            settings,
            device,
            selection_rx: scheduler.subscribe_selection(),
            table_rx: scheduler.subscribe_table(),
            scheduler_rx: scheduler.subscribe_status(),
            snapshot_rx: mirror.subscribe(),
            status_tx,
        }
    }
}

/// Error body returned for rejected requests
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps service errors to HTTP status codes
pub struct ApiError(PowersaveError);

impl From<PowersaveError> for ApiError {
    fn from(e: PowersaveError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PowersaveError::InvalidConfigValue { .. } => StatusCode::BAD_REQUEST,
            PowersaveError::Modbus { .. }
            | PowersaveError::DeviceIo { .. }
            | PowersaveError::Timeout { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AutoModeBody {
    pub enabled: bool,
}

/// Slider value; deltas in °C, run hours as a count
#[derive(Deserialize, ToSchema)]
pub struct ValueBody {
    pub value: f64,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub version: String,
    pub thresholds: ThresholdConfig,
    pub selected_hours: SelectedHours,
    pub scheduler: SchedulerStatus,
    pub device: DeviceSnapshot,
}

#[derive(Serialize, ToSchema)]
pub struct PricesResponse {
    /// Absent until the first successful refresh
    pub table: Option<PriceTable>,
    pub selected_hours: SelectedHours,
    /// Price of each selected slot, in pick order
    pub selected_prices: Vec<Option<f64>>,
}

#[derive(Serialize, ToSchema)]
pub struct CommandResponse {
    pub ok: bool,
    pub command: String,
}

#[utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
))]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[utoipa::path(get, path = "/api/status", responses(
    (status = 200, description = "Thresholds, selection, last tick and mirrored device values", body = StatusResponse)
))]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("APP_VERSION").to_string(),
        thresholds: state.settings.snapshot(),
        selected_hours: (**state.selection_rx.borrow()).clone(),
        scheduler: (**state.scheduler_rx.borrow()).clone(),
        device: (**state.snapshot_rx.borrow()).clone(),
    })
}

#[utoipa::path(get, path = "/api/settings", responses(
    (status = 200, body = ThresholdConfig)
))]
pub async fn get_settings(State(state): State<AppState>) -> Json<ThresholdConfig> {
    Json(state.settings.snapshot())
}

#[utoipa::path(put, path = "/api/settings/auto_mode", request_body = AutoModeBody, responses(
    (status = 200, body = ThresholdConfig)
))]
pub async fn put_auto_mode(
    State(state): State<AppState>,
    Json(body): Json<AutoModeBody>,
) -> Result<Json<ThresholdConfig>, ApiError> {
    state.settings.set_auto_mode(body.enabled)?;
    Ok(Json(state.settings.snapshot()))
}

#[utoipa::path(put, path = "/api/settings/must_heat_delta", request_body = ValueBody, responses(
    (status = 200, body = ThresholdConfig),
    (status = 400, body = ErrorBody)
))]
pub async fn put_must_heat_delta(
    State(state): State<AppState>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ThresholdConfig>, ApiError> {
    state.settings.set_must_heat_delta(body.value)?;
    Ok(Json(state.settings.snapshot()))
}

#[utoipa::path(put, path = "/api/settings/stop_heat_delta", request_body = ValueBody, responses(
    (status = 200, body = ThresholdConfig),
    (status = 400, body = ErrorBody)
))]
pub async fn put_stop_heat_delta(
    State(state): State<AppState>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ThresholdConfig>, ApiError> {
    state.settings.set_stop_heat_delta(body.value)?;
    Ok(Json(state.settings.snapshot()))
}

#[utoipa::path(put, path = "/api/settings/run_hours", request_body = ValueBody, responses(
    (status = 200, body = ThresholdConfig),
    (status = 400, body = ErrorBody)
))]
pub async fn put_run_hours(
    State(state): State<AppState>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ThresholdConfig>, ApiError> {
    state.settings.set_run_hours(body.value)?;
    Ok(Json(state.settings.snapshot()))
}

#[utoipa::path(get, path = "/api/prices", responses(
    (status = 200, body = PricesResponse)
))]
pub async fn prices(State(state): State<AppState>) -> Json<PricesResponse> {
    let table = state.table_rx.borrow().clone();
    let selected = (**state.selection_rx.borrow()).clone();
    let selected_prices = table
        .as_deref()
        .map(|t| selected_prices(t, &selected))
        .unwrap_or_else(|| vec![None; selected.len()]);
    Json(PricesResponse {
        table: table.map(|t| (*t).clone()),
        selected_hours: selected,
        selected_prices,
    })
}

#[utoipa::path(post, path = "/api/device/command", request_body = DeviceCommand, responses(
    (status = 200, body = CommandResponse),
    (status = 400, body = ErrorBody),
    (status = 502, body = ErrorBody)
))]
pub async fn device_command(
    State(state): State<AppState>,
    Json(command): Json<DeviceCommand>,
) -> Result<Json<CommandResponse>, ApiError> {
    let logger = crate::logging::get_logger("web");
    let update = command
        .to_update(state.config.scheduler.pause_duration_minutes)
        .inspect_err(|e| logger.warn(&format!("Rejected {}: {}", command.name(), e)))?;
    state.device.send_settings(&update).await?;
    logger.info(&format!("Applied device command {:?}", command));
    Ok(Json(CommandResponse {
        ok: true,
        command: command.name().to_string(),
    }))
}

#[utoipa::path(get, path = "/api/config", responses((status = 200)))]
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(
        serde_json::to_value(state.config.as_ref())
            .unwrap_or(serde_json::json!({"error":"serialization"})),
    )
}

#[utoipa::path(get, path = "/api/config/schema", responses((status = 200)))]
pub async fn get_config_schema() -> impl IntoResponse {
    let schema = schemars::schema_for!(crate::config::Config);
    Json(serde_json::to_value(&schema).unwrap_or(serde_json::json!({"error":"schema"})))
}

#[utoipa::path(get, path = "/api/events", responses((status = 200)))]
pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.status_tx.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok::<Event, std::convert::Infallible>(
            Event::default().event("status").data(payload),
        )),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health, status, get_settings,
        put_auto_mode, put_must_heat_delta, put_stop_heat_delta, put_run_hours,
        prices, device_command,
        get_config, get_config_schema,
        events,
    ),
    components(schemas(
        AutoModeBody, ValueBody, ErrorBody, StatusResponse, PricesResponse, CommandResponse,
        ThresholdConfig, DeviceCommand,
    )),
    tags((name = "nilan-powersave", description = "Nilan hot-water power save API"))
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/settings", get(get_settings))
        .route("/api/settings/auto_mode", put(put_auto_mode))
        .route("/api/settings/must_heat_delta", put(put_must_heat_delta))
        .route("/api/settings/stop_heat_delta", put(put_stop_heat_delta))
        .route("/api/settings/run_hours", put(put_run_hours))
        .route("/api/prices", get(prices))
        .route("/api/device/command", post(device_command))
        .route("/api/config", get(get_config))
        .route("/api/config/schema", get(get_config_schema))
        .route("/api/events", get(events))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` flips to true
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            SocketAddr::from(([127, 0, 0, 1], port))
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api, docs /docs)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}
