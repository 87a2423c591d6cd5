use crate::cache::SeriesCache;
use crate::dashboard::{query_dashboard, DashboardState};
use crate::metrics;
use crate::series::Window;
use crate::store::{StoreBinding, TableName};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono_tz::Tz;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    connector: StoreBinding,
    cache: Arc<SeriesCache>,
    table: TableName,
    tz: Tz,
}

#[derive(Debug, Deserialize)]
pub struct TemperatureQuery {
    window: Option<String>,
}

pub fn create_router(
    connector: StoreBinding,
    cache: Arc<SeriesCache>,
    table: TableName,
    tz: Tz,
) -> Router {
    let state = AppState {
        connector,
        cache,
        table,
        tz,
    };

    Router::new()
        .route("/api/v1/temperature", get(get_temperature))
        .route("/api/v1/cache/clear", post(clear_cache))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn get_temperature(
    State(state): State<AppState>,
    Query(params): Query<TemperatureQuery>,
) -> Result<Response, AppError> {
    let window = match params.window.as_deref() {
        Some(raw) => raw.parse::<Window>()?,
        None => Window::default(),
    };

    let dashboard = query_dashboard(
        &state.connector,
        &state.cache,
        &state.table,
        state.tz,
        window,
    )
    .await;

    let status = match dashboard {
        DashboardState::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    Ok((status, Json(dashboard)).into_response())
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.cache.clear();
    info!("Series cache cleared on request");
    StatusCode::NO_CONTENT
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (StatusCode::BAD_REQUEST, format!("Bad request: {}", self.0)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
