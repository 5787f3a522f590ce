//! REST API module
//!
//! Generic table routes backed by [`TableStore`] and the fixed-shape
//! dashboard routes backed by [`DashboardService`]. Every error leaves as
//! `{"error": <message>}` with the status of its [`ErrorKind`].

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use crate::database::{ConnectionProvider, DashboardService, TableStore};
use crate::error::{Error, ErrorKind};

pub mod dashboard_routes;
pub mod table_routes;

pub use dashboard_routes::create_dashboard_router;
pub use table_routes::create_table_router;

/// Shared state for all routes
#[derive(Clone)]
pub struct AppState {
    pub tables: Arc<TableStore>,
    pub dashboard: Arc<DashboardService>,
}

impl AppState {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            tables: Arc::new(TableStore::new(Arc::clone(&provider))),
            dashboard: Arc::new(DashboardService::new(provider)),
        }
    }
}

/// Full application router
///
/// Dashboard routes are merged first so that `GET /api/inventory` resolves
/// to the cross-branch view rather than the generic list.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(create_dashboard_router())
        .merge(create_table_router())
        .with_state(state)
}

/// Error response wrapper
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DataStore => {
                tracing::error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;
