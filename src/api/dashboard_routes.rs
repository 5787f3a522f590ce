//! Dashboard endpoints
//!
//! ## Endpoints
//!
//! - `GET /` - Dashboard page
//! - `GET /health` - Branch reachability and minutes since the last sync
//! - `GET /api/status` - Last success/failure and latest status
//! - `GET /api/counts` - Row counts per branch
//! - `GET /api/logs` - Recent sync log entries (`?limit=`, default 50)
//! - `GET /api/inventory` - Inventory from both branches (`?limit=`, default 20)
//! - `POST /api/inventory` - Generic create on `inventory`

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};

use super::table_routes::{lenient_object, ListQuery};
use super::{ApiResult, AppState};
use crate::database::crud::JsonRow;
use crate::database::dashboard::{Health, SyncStatus, TableCounts};

pub const DEFAULT_LOG_LIMIT: i64 = 50;
pub const DEFAULT_INVENTORY_LIMIT: i64 = 20;

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub fn create_dashboard_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/counts", get(counts))
        .route("/api/logs", get(logs))
        .route("/api/inventory", get(inventory).post(create_inventory))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> ApiResult<Health> {
    Ok(Json(state.dashboard.health().await?))
}

async fn status(State(state): State<AppState>) -> ApiResult<SyncStatus> {
    Ok(Json(state.dashboard.status().await?))
}

async fn counts(State(state): State<AppState>) -> ApiResult<BTreeMap<&'static str, TableCounts>> {
    Ok(Json(state.dashboard.counts().await?))
}

async fn logs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<JsonRow>> {
    let limit = query.limit()?.unwrap_or(DEFAULT_LOG_LIMIT);
    Ok(Json(state.dashboard.logs(limit).await?))
}

async fn inventory(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<JsonRow>> {
    let limit = query.limit()?.unwrap_or(DEFAULT_INVENTORY_LIMIT);
    Ok(Json(state.dashboard.inventory(limit).await?))
}

async fn create_inventory(State(state): State<AppState>, body: Bytes) -> ApiResult<JsonRow> {
    let payload = lenient_object(&body);
    Ok(Json(state.tables.create("inventory", &payload).await?))
}
