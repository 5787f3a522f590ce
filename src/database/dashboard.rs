//! Fixed-shape reads behind the dashboard
//!
//! Sync status, row counts, sync logs, the cross-branch inventory view and
//! health. Each read returns a `Result`; the public methods degrade to an
//! empty or zero value only for failures `Error::is_degradable` accepts,
//! so a missing remote branch never breaks the overview page.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use sqlx::PgConnection;
use tracing::warn;

use super::crud::JsonRow;
use super::row::{decode_row, to_json, RawValue};
use super::{release, Branch, ConnectionProvider};
use crate::error::Result;

/// `last_sync_min` reported when no successful sync is known
pub const NO_SYNC_MINUTES: i64 = 99999;

const LOG_COLUMNS: [&str; 5] = [
    "sync_time",
    "records_synced",
    "status",
    "error_message",
    "sync_type",
];

const INVENTORY_COLUMNS: [&str; 5] = ["id", "product_name", "quantity", "price", "last_updated"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub last_success: JsonValue,
    pub last_failure: JsonValue,
    pub last_status: JsonValue,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            last_success: JsonValue::Null,
            last_failure: JsonValue::Null,
            last_status: JsonValue::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub inventory: i64,
    pub sales: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    pub local_db_ok: bool,
    pub remote_db_ok: bool,
    pub last_sync_min: i64,
}

fn degrade<T>(what: &str, result: Result<T>, fallback: impl FnOnce() -> T) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_degradable() => {
            warn!("{} unavailable, using default: {}", what, e);
            Ok(fallback())
        }
        Err(e) => Err(e),
    }
}

async fn scalar(conn: &mut PgConnection, sql: &'static str) -> Result<JsonValue> {
    match sqlx::query(sql).fetch_optional(&mut *conn).await? {
        Some(row) => Ok(RawValue::decode(&row, 0)?.into_json()),
        None => Ok(JsonValue::Null),
    }
}

fn json_text(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Newest first by (`last_updated` text, `id`); rows without a timestamp lead
pub(crate) fn sort_inventory(rows: &mut [JsonRow]) {
    fn key(row: &JsonRow) -> (bool, String, i64) {
        let last_updated = row.get("last_updated").filter(|v| !v.is_null());
        (
            last_updated.is_none(),
            json_text(last_updated),
            row.get("id").and_then(JsonValue::as_i64).unwrap_or(0),
        )
    }
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// Read-only views over both branches
pub struct DashboardService {
    provider: Arc<dyn ConnectionProvider>,
}

impl DashboardService {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Latest success/failure times and the status of the latest run (Branch-A)
    pub async fn status(&self) -> Result<SyncStatus> {
        let result = async {
            let mut conn = self.provider.connect(Branch::Local).await?;
            let status = Self::read_status(&mut conn).await;
            release(conn).await;
            status
        }
        .await;
        degrade("sync status", result, SyncStatus::default)
    }

    /// Row counts of the replicated tables on each branch
    pub async fn counts(&self) -> Result<BTreeMap<&'static str, TableCounts>> {
        let mut out = BTreeMap::new();
        for branch in Branch::ALL {
            let result = async {
                let mut conn = self.provider.connect(branch).await?;
                let counts = Self::read_counts(&mut conn).await;
                release(conn).await;
                counts
            }
            .await;
            out.insert(
                branch.key(),
                degrade(branch.key(), result, TableCounts::default)?,
            );
        }
        Ok(out)
    }

    /// Most recent sync log entries (Branch-A)
    pub async fn logs(&self, limit: i64) -> Result<Vec<JsonRow>> {
        let result = async {
            let mut conn = self.provider.connect(Branch::Local).await?;
            let logs = Self::read_logs(&mut conn, limit).await;
            release(conn).await;
            logs
        }
        .await;
        degrade("sync logs", result, Vec::new)
    }

    /// Up to `limit` recent inventory rows from each branch, merged
    pub async fn inventory(&self, limit: i64) -> Result<Vec<JsonRow>> {
        let mut merged = Vec::new();
        for branch in Branch::ALL {
            let result = async {
                let mut conn = self.provider.connect(branch).await?;
                let rows = Self::read_inventory(&mut conn, branch, limit).await;
                release(conn).await;
                rows
            }
            .await;
            merged.extend(degrade("inventory", result, Vec::new)?);
        }
        sort_inventory(&mut merged);
        Ok(merged)
    }

    pub async fn health(&self) -> Result<Health> {
        let (local_db_ok, last_sync_min) = match self.provider.connect(Branch::Local).await {
            Ok(mut conn) => {
                let minutes = Self::minutes_since_success(&mut conn).await;
                release(conn).await;
                (true, degrade("last sync age", minutes, || NO_SYNC_MINUTES)?)
            }
            Err(e) => (degrade("local branch", Err(e), || false)?, NO_SYNC_MINUTES),
        };

        let remote_db_ok = match self.provider.connect(Branch::Remote).await {
            Ok(conn) => {
                release(conn).await;
                true
            }
            Err(e) => degrade("remote branch", Err(e), || false)?,
        };

        Ok(Health {
            local_db_ok,
            remote_db_ok,
            last_sync_min,
        })
    }

    async fn read_status(conn: &mut PgConnection) -> Result<SyncStatus> {
        Ok(SyncStatus {
            last_success: scalar(
                conn,
                "SELECT MAX(sync_time) FROM sync_logs WHERE status = 'SUCCESS'",
            )
            .await?,
            last_failure: scalar(
                conn,
                "SELECT MAX(sync_time) FROM sync_logs WHERE status = 'FAILURE'",
            )
            .await?,
            last_status: scalar(
                conn,
                "SELECT status FROM sync_logs ORDER BY sync_time DESC LIMIT 1",
            )
            .await?,
        })
    }

    async fn read_counts(conn: &mut PgConnection) -> Result<TableCounts> {
        let inventory: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(&mut *conn)
            .await?;
        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&mut *conn)
            .await?;
        Ok(TableCounts { inventory, sales })
    }

    async fn read_logs(conn: &mut PgConnection, limit: i64) -> Result<Vec<JsonRow>> {
        let rows = sqlx::query(
            r#"
            SELECT sync_time, records_synced, status, COALESCE(error_message, ''), sync_type
            FROM sync_logs
            ORDER BY sync_time DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| decode_row(row).map(|values| to_json(LOG_COLUMNS, values)))
            .collect()
    }

    async fn read_inventory(
        conn: &mut PgConnection,
        branch: Branch,
        limit: i64,
    ) -> Result<Vec<JsonRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_name, quantity, price::text, last_updated
            FROM inventory
            ORDER BY last_updated DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| -> Result<JsonRow> {
                let mut item = Map::new();
                item.insert("branch".to_string(), JsonValue::String(branch.to_string()));
                item.extend(to_json(INVENTORY_COLUMNS, decode_row(row)?));
                Ok(item)
            })
            .collect()
    }

    async fn minutes_since_success(conn: &mut PgConnection) -> Result<i64> {
        let minutes: i64 = sqlx::query_scalar(
            r#"
            SELECT CAST(COALESCE(TRUNC(EXTRACT(EPOCH FROM (NOW() - MAX(sync_time))) / 60), 99999) AS int8)
            FROM sync_logs
            WHERE status = 'SUCCESS'
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;
        Ok(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use serde_json::json;

    struct RefusingProvider;

    #[async_trait]
    impl ConnectionProvider for RefusingProvider {
        async fn connect(&self, branch: Branch) -> Result<PgConnection> {
            Err(Error::Unavailable {
                branch,
                reason: "connection refused".into(),
            })
        }
    }

    fn service() -> DashboardService {
        DashboardService::new(Arc::new(RefusingProvider))
    }

    fn row(value: JsonValue) -> JsonRow {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_branches_degrade() {
        let dashboard = service();

        assert_eq!(dashboard.status().await.unwrap(), SyncStatus::default());
        assert!(dashboard.logs(20).await.unwrap().is_empty());
        assert!(dashboard.inventory(20).await.unwrap().is_empty());

        let counts = dashboard.counts().await.unwrap();
        assert_eq!(counts["branch_a"], TableCounts::default());
        assert_eq!(counts["branch_b"], TableCounts::default());

        assert_eq!(
            dashboard.health().await.unwrap(),
            Health {
                local_db_ok: false,
                remote_db_ok: false,
                last_sync_min: NO_SYNC_MINUTES,
            }
        );
    }

    #[test]
    fn test_non_degradable_errors_propagate() {
        let result: Result<i64> = Err(Error::Database(sqlx::Error::RowNotFound));
        assert!(degrade("x", result, || 0).is_err());

        let result: Result<i64> = Err(Error::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(degrade("x", result, || 0).unwrap(), 0);
    }

    #[test]
    fn test_inventory_merge_is_newest_first() {
        let mut rows = vec![
            row(json!({"branch": "BRANCH-A", "id": 1, "last_updated": "2024-01-01T10:00:00"})),
            row(json!({"branch": "BRANCH-B", "id": 7, "last_updated": "2024-01-02T08:00:00"})),
            row(json!({"branch": "BRANCH-A", "id": 3, "last_updated": "2024-01-01T10:00:00"})),
            row(json!({"branch": "BRANCH-B", "id": 2, "last_updated": null})),
        ];
        sort_inventory(&mut rows);

        let order: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![2, 7, 3, 1]);
    }
}
