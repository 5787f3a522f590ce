//! Generic table endpoints
//!
//! ## Endpoints
//!
//! - `GET /api/:table` - List rows (`?limit=`, default 50)
//! - `POST /api/:table` - Create a row from the JSON body
//! - `GET /api/:table/:id` - Read one row
//! - `PUT|PATCH /api/:table/:id` - Update a row from the JSON body
//! - `DELETE /api/:table/:id` - Delete a row

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{ApiResult, AppState};
use crate::database::crud::JsonRow;
use crate::error::Error;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
}

impl ListQuery {
    pub fn limit(&self) -> Result<Option<i64>, Error> {
        self.limit
            .as_deref()
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidRequest(format!("invalid limit: {}", raw)))
            })
            .transpose()
    }
}

/// Body as a JSON object; anything else counts as empty
pub(crate) fn lenient_object(body: &[u8]) -> JsonRow {
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(JsonValue::Object(map)) => map,
        _ => JsonRow::new(),
    }
}

/// Only unsigned decimal ids name a row
fn parse_id(raw: &str) -> Result<i64, Error> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::NotFound);
    }
    raw.parse().map_err(|_| Error::NotFound)
}

pub fn create_table_router() -> Router<AppState> {
    Router::new()
        .route("/api/:table", get(list_rows).post(create_row))
        .route(
            "/api/:table/:id",
            get(read_row)
                .put(update_row)
                .patch(update_row)
                .delete(delete_row),
        )
}

async fn list_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<JsonRow>> {
    let limit = query.limit()?;
    Ok(Json(state.tables.list(&table, limit).await?))
}

async fn create_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Bytes,
) -> ApiResult<JsonRow> {
    let payload = lenient_object(&body);
    Ok(Json(state.tables.create(&table, &payload).await?))
}

async fn read_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<JsonRow> {
    let id = parse_id(&id)?;
    Ok(Json(state.tables.read(&table, id).await?))
}

async fn update_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<JsonRow> {
    let id = parse_id(&id)?;
    let payload = lenient_object(&body);
    Ok(Json(state.tables.update(&table, id, &payload).await?))
}

async fn delete_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<JsonValue> {
    let id = parse_id(&id)?;
    Ok(Json(state.tables.delete(&table, id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_object() {
        assert_eq!(
            JsonValue::Object(lenient_object(br#"{"quantity": 3}"#)),
            json!({"quantity": 3})
        );
        assert!(lenient_object(b"").is_empty());
        assert!(lenient_object(b"{not json").is_empty());
        assert!(lenient_object(b"[1, 2]").is_empty());
        assert!(lenient_object(b"\"text\"").is_empty());
    }

    #[test]
    fn test_limit_parsing() {
        let query = |limit: Option<&str>| ListQuery {
            limit: limit.map(str::to_string),
        };
        assert_eq!(query(None).limit().unwrap(), None);
        assert_eq!(query(Some("3")).limit().unwrap(), Some(3));
        assert!(matches!(
            query(Some("three")).limit(),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_non_integer_id_is_not_found() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id("0").unwrap(), 0);
        for raw in ["abc", "-1", "+5", " 7", "1.5", "99999999999999999999"] {
            assert!(matches!(parse_id(raw), Err(Error::NotFound)), "{}", raw);
        }
    }
}
