//!
//! token_viewer HTTP server
//! ------------------------
//! Axum host for the viewer page. The page itself is static; it pulls the
//! raw table, the entity list and the chart through the JSON API below and
//! draws the chart with vega-embed.
//!
//! Routes:
//! - `GET  /`                 viewer page
//! - `GET  /health`           liveness probe
//! - `GET  /api/table`        raw table (`columns`, `rows`)
//! - `GET  /api/entities`     sorted entity names and the default selection
//! - `GET  /api/chart`        chart for the default selection
//! - `POST /api/chart`        chart for `{ "names": [...] }` (`names` omitted = default)
//! - `POST /api/cache/clear`  drop the cached table so the next call reloads it
//!
//! Store access is blocking, so every handler hops onto the blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::chart::ChartOutcome;
use crate::config::ViewerConfig;
use crate::error::{AppError, AppResult};
use crate::frame::TableView;
use crate::selection::Selection;
use crate::viewer::{Entities, ViewerState};

const PAGE_TEMPLATE: &str = include_str!("server/page.html");

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub viewer: Arc<ViewerState>,
}

impl AppState {
    pub fn new(config: ViewerConfig) -> Self {
        Self { viewer: Arc::new(ViewerState::new(config)) }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartRequest {
    #[serde(default)]
    pub names: Option<Selection>,
}

#[derive(Debug, Serialize)]
struct TableResponse {
    #[serde(flatten)]
    view: TableView,
    row_count: usize,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "status": "error", "error": self }))).into_response()
    }
}

/// Run `f` against the viewer on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> AppResult<T>
where
    F: FnOnce(&ViewerState) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let viewer = state.viewer.clone();
    let res = tokio::task::spawn_blocking(move || f(&viewer))
        .await
        .map_err(|e| AppError::internal("join_error", e.to_string()))?;
    if let Err(e) = &res {
        error!(target: "token_viewer::server", "request failed: {}", e);
    }
    res
}

fn render_page(config: &ViewerConfig) -> String {
    PAGE_TEMPLATE
        .replace("{{PAGE_TITLE}}", &config.page_title)
        .replace("{{CHART_TITLE}}", &config.chart_title)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(state.viewer.config()))
}

async fn table_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let view = blocking(&state, |v| v.table_view()).await?;
    let row_count = view.height();
    let body = serde_json::to_value(TableResponse { view, row_count })
        .map_err(|e| AppError::internal("serialize_error", e.to_string()))?;
    Ok(Json(body))
}

async fn entities_handler(State(state): State<AppState>) -> Result<Json<Entities>, AppError> {
    Ok(Json(blocking(&state, |v| v.entities()).await?))
}

async fn default_chart_handler(State(state): State<AppState>) -> Result<Json<ChartOutcome>, AppError> {
    Ok(Json(blocking(&state, |v| v.chart(None)).await?))
}

async fn chart_handler(State(state): State<AppState>, Json(req): Json<ChartRequest>) -> Result<Json<ChartOutcome>, AppError> {
    let outcome = blocking(&state, move |v| {
        if let Some(sel) = &req.names {
            sel.validate_against(&v.entities()?.universe)?;
        }
        v.chart(req.names.as_ref())
    })
    .await?;
    Ok(Json(outcome))
}

async fn clear_cache_handler(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.viewer.invalidate();
    Json(json!({ "status": "ok", "removed": removed }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "token_viewer ok" }))
        .route("/api/table", get(table_handler))
        .route("/api/entities", get(entities_handler))
        .route("/api/chart", get(default_chart_handler).post(chart_handler))
        .route("/api/cache/clear", post(clear_cache_handler))
        .with_state(state)
}

/// Serve the viewer on `config.http_port` until the process is stopped.
pub async fn run(config: ViewerConfig) -> anyhow::Result<()> {
    info!(
        target: "token_viewer::server",
        "token_viewer starting: store='{}' exists={} table='{}' http_port={}",
        config.store_path.display(), config.store_path.is_file(), config.table_name, config.http_port
    );
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let app = router(AppState::new(config));
    info!(target: "token_viewer::server", "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_template_is_filled_in() {
        let html = render_page(&ViewerConfig::default());
        assert!(html.contains("<title>Token Data Viewer</title>"));
        assert!(html.contains("Graduation % over time"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn chart_request_names_are_optional() {
        let r: ChartRequest = serde_json::from_str("{}").unwrap();
        assert!(r.names.is_none());
        let r: ChartRequest = serde_json::from_str(r#"{"names": []}"#).unwrap();
        assert_eq!(r.names, Some(Selection::empty()));
    }

    #[test]
    fn errors_render_with_their_status() {
        let resp = AppError::data_source("store_not_found", "gone").into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let resp = AppError::user("unknown_entity", "Q").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
