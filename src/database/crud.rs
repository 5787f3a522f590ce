//! Dynamic table CRUD engine
//!
//! List, create, read, update and delete against any table on the
//! allowlist, driven by the column set the catalog reports. Writes only
//! ever go to Branch-A.
//!
//! Each operation follows the same path: validate the table, open a
//! connection, look up (or reuse) the columns, build the statement, run
//! it, commit writes, serialize, release the connection.

use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};
use sqlx::{Connection, PgConnection, Row};
use tracing::{debug, info};

use super::catalog::{ColumnDescriptor, SchemaCatalog};
use super::identifier::{Identifier, TableName};
use super::row::{decode_row, to_json};
use super::statement::{Statement, Value};
use super::{release, Branch, ConnectionProvider};
use crate::error::{Error, Result};

/// Row count returned by `list` when the caller gives none
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// A serialized row, keyed by column name
pub type JsonRow = Map<String, JsonValue>;

/// One `column = value` pair of an insert or update
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assignment<'a> {
    pub column: &'a ColumnDescriptor,
    pub value: Value,
}

/// Keep the payload entries that name a known, non-`id` column.
///
/// Unknown keys are dropped silently; an empty result is a validation error.
pub(crate) fn writable_columns<'a>(
    columns: &'a [ColumnDescriptor],
    payload: &JsonRow,
) -> Result<Vec<Assignment<'a>>> {
    let assignments: Vec<_> = columns
        .iter()
        .filter(|column| column.name != "id")
        .filter_map(|column| {
            payload.get(&column.name).map(|value| Assignment {
                column,
                value: Value::from_json(value, column),
            })
        })
        .collect();

    if assignments.is_empty() {
        return Err(Error::NoValidColumns);
    }
    Ok(assignments)
}

// ORDER BY 1 DESC treats the first column as a recency proxy. That only
// holds for tables whose first column grows monotonically (a serial id).
pub(crate) fn list_statement(table: &TableName, columns: &[ColumnDescriptor], limit: i64) -> Statement {
    let mut stmt = Statement::new("SELECT ");
    stmt.select_list(columns)
        .sql(" FROM ")
        .identifier(&Identifier::table(table))
        .sql(" ORDER BY 1 DESC LIMIT ")
        .value(Value::Int(limit));
    stmt
}

pub(crate) fn select_by_id_statement(
    table: &TableName,
    columns: &[ColumnDescriptor],
    id: i64,
) -> Statement {
    let mut stmt = Statement::new("SELECT ");
    stmt.select_list(columns)
        .sql(" FROM ")
        .identifier(&Identifier::table(table))
        .sql(" WHERE ")
        .identifier(&Identifier::primary_key())
        .sql(" = ")
        .value(Value::Int(id));
    stmt
}

pub(crate) fn insert_statement(table: &TableName, assignments: &[Assignment<'_>]) -> Statement {
    let mut stmt = Statement::new("INSERT INTO ");
    stmt.identifier(&Identifier::table(table)).sql(" (");
    for (i, assignment) in assignments.iter().enumerate() {
        if i > 0 {
            stmt.sql(", ");
        }
        stmt.identifier(&assignment.column.identifier());
    }
    stmt.sql(") VALUES (");
    for (i, assignment) in assignments.iter().enumerate() {
        if i > 0 {
            stmt.sql(", ");
        }
        stmt.cast_value(
            assignment.value.clone(),
            &assignment.column.type_identifier(),
        );
    }
    stmt.sql(") RETURNING CAST(")
        .identifier(&Identifier::primary_key())
        .sql(" AS int8)");
    stmt
}

pub(crate) fn update_statement(
    table: &TableName,
    assignments: &[Assignment<'_>],
    id: i64,
) -> Statement {
    let mut stmt = Statement::new("UPDATE ");
    stmt.identifier(&Identifier::table(table)).sql(" SET ");
    for (i, assignment) in assignments.iter().enumerate() {
        if i > 0 {
            stmt.sql(", ");
        }
        stmt.identifier(&assignment.column.identifier())
            .sql(" = ")
            .cast_value(
                assignment.value.clone(),
                &assignment.column.type_identifier(),
            );
    }
    stmt.sql(" WHERE ")
        .identifier(&Identifier::primary_key())
        .sql(" = ")
        .value(Value::Int(id));
    stmt
}

pub(crate) fn delete_statement(table: &TableName, id: i64) -> Statement {
    let mut stmt = Statement::new("DELETE FROM ");
    stmt.identifier(&Identifier::table(table))
        .sql(" WHERE ")
        .identifier(&Identifier::primary_key())
        .sql(" = ")
        .value(Value::Int(id));
    stmt
}

fn column_names(columns: &[ColumnDescriptor]) -> impl Iterator<Item = &str> {
    columns.iter().map(|c| c.name.as_str())
}

fn require_columns(table: &TableName, columns: &[ColumnDescriptor]) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::EmptySchema(table.to_string()));
    }
    Ok(())
}

/// Schema-driven CRUD over the allowlisted tables of Branch-A
pub struct TableStore {
    provider: Arc<dyn ConnectionProvider>,
    catalog: SchemaCatalog,
}

impl TableStore {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            catalog: SchemaCatalog::new(),
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Most recent rows first, at most `limit` (default 50)
    pub async fn list(&self, table: &str, limit: Option<i64>) -> Result<Vec<JsonRow>> {
        let table = TableName::parse(table)?;
        let mut conn = self.provider.connect(Branch::Local).await?;
        let result = self
            .list_on(&mut conn, &table, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await;
        release(conn).await;
        result
    }

    /// Insert a row from `payload` and return it as stored
    pub async fn create(&self, table: &str, payload: &JsonRow) -> Result<JsonRow> {
        let table = TableName::parse(table)?;
        let mut conn = self.provider.connect(Branch::Local).await?;
        let result = self.create_on(&mut conn, &table, payload).await;
        release(conn).await;
        result
    }

    pub async fn read(&self, table: &str, id: i64) -> Result<JsonRow> {
        let table = TableName::parse(table)?;
        let mut conn = self.provider.connect(Branch::Local).await?;
        let result = self.read_on(&mut conn, &table, id).await;
        release(conn).await;
        result
    }

    /// Apply `payload` to row `id` and return the row as stored
    pub async fn update(&self, table: &str, id: i64, payload: &JsonRow) -> Result<JsonRow> {
        let table = TableName::parse(table)?;
        let mut conn = self.provider.connect(Branch::Local).await?;
        let result = self.update_on(&mut conn, &table, id, payload).await;
        release(conn).await;
        result
    }

    /// Delete row `id`; succeeds whether or not the row existed
    pub async fn delete(&self, table: &str, id: i64) -> Result<JsonValue> {
        let table = TableName::parse(table)?;
        let mut conn = self.provider.connect(Branch::Local).await?;
        let result = Self::delete_on(&mut conn, &table, id).await;
        release(conn).await;
        result
    }

    async fn list_on(
        &self,
        conn: &mut PgConnection,
        table: &TableName,
        limit: i64,
    ) -> Result<Vec<JsonRow>> {
        let columns = self.catalog.columns(table, &mut *conn).await?;
        require_columns(table, &columns)?;

        let mut stmt = list_statement(table, &columns, limit);
        debug!(sql = stmt.as_sql(), "list");
        let rows = stmt.build().fetch_all(&mut *conn).await?;

        rows.iter()
            .map(|row| decode_row(row).map(|values| to_json(column_names(&columns), values)))
            .collect()
    }

    async fn create_on(
        &self,
        conn: &mut PgConnection,
        table: &TableName,
        payload: &JsonRow,
    ) -> Result<JsonRow> {
        let columns = self.catalog.columns(table, &mut *conn).await?;
        let assignments = writable_columns(&columns, payload)?;

        let mut stmt = insert_statement(table, &assignments);
        debug!(sql = stmt.as_sql(), "create");

        let mut tx = conn.begin().await?;
        let new_id: i64 = stmt.build().fetch_one(&mut *tx).await?.try_get(0)?;
        tx.commit().await?;
        info!("Created {} row id={}", table, new_id);

        Self::fetch_by_id(conn, table, &columns, new_id)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn read_on(&self, conn: &mut PgConnection, table: &TableName, id: i64) -> Result<JsonRow> {
        let columns = self.catalog.columns(table, &mut *conn).await?;
        require_columns(table, &columns)?;

        Self::fetch_by_id(conn, table, &columns, id)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn update_on(
        &self,
        conn: &mut PgConnection,
        table: &TableName,
        id: i64,
        payload: &JsonRow,
    ) -> Result<JsonRow> {
        let columns = self.catalog.columns(table, &mut *conn).await?;
        let assignments = writable_columns(&columns, payload)?;

        let mut stmt = update_statement(table, &assignments, id);
        debug!(sql = stmt.as_sql(), "update");

        let mut tx = conn.begin().await?;
        let affected = stmt.build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;
        info!("Updated {} row id={} ({} affected)", table, id, affected);

        Self::fetch_by_id(conn, table, &columns, id)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn delete_on(conn: &mut PgConnection, table: &TableName, id: i64) -> Result<JsonValue> {
        let mut stmt = delete_statement(table, id);
        debug!(sql = stmt.as_sql(), "delete");

        let mut tx = conn.begin().await?;
        let affected = stmt.build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;
        info!("Deleted {} row id={} ({} affected)", table, id, affected);

        Ok(json!({"deleted": true, "id": id}))
    }

    async fn fetch_by_id(
        conn: &mut PgConnection,
        table: &TableName,
        columns: &[ColumnDescriptor],
        id: i64,
    ) -> Result<Option<JsonRow>> {
        let mut stmt = select_by_id_statement(table, columns, id);
        match stmt.build().fetch_optional(&mut *conn).await? {
            Some(row) => Ok(Some(to_json(column_names(columns), decode_row(&row)?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::tests::inventory_columns;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that records connection attempts and refuses all of them
    #[derive(Default)]
    struct RefusingProvider {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionProvider for RefusingProvider {
        async fn connect(&self, branch: Branch) -> Result<PgConnection> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Unavailable {
                branch,
                reason: "refused".into(),
            })
        }
    }

    fn payload(value: JsonValue) -> JsonRow {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn inventory() -> TableName {
        TableName::parse("inventory").unwrap()
    }

    #[test]
    fn test_writable_columns_drop_unknown_and_id() {
        let columns = inventory_columns();
        let body = payload(json!({
            "id": 99,
            "product_name": "Widget",
            "quantity": 5,
            "not_a_column": true
        }));

        let assignments = writable_columns(&columns, &body).unwrap();
        let names: Vec<_> = assignments.iter().map(|a| a.column.name.as_str()).collect();
        assert_eq!(names, vec!["product_name", "quantity"]);
        assert_eq!(assignments[0].value, Value::Text(Some("Widget".into())));
        assert_eq!(assignments[1].value, Value::Number("5".into()));
    }

    #[test]
    fn test_only_unknown_keys_is_validation_error() {
        let columns = inventory_columns();
        let err = writable_columns(&columns, &payload(json!({"not_a_column": 1}))).unwrap_err();
        assert!(matches!(err, Error::NoValidColumns));

        let err = writable_columns(&columns, &payload(json!({"id": 1}))).unwrap_err();
        assert!(matches!(err, Error::NoValidColumns));

        let err = writable_columns(&[], &payload(json!({"product_name": "x"}))).unwrap_err();
        assert!(matches!(err, Error::NoValidColumns));
    }

    #[test]
    fn test_list_statement() {
        let columns = inventory_columns();
        let stmt = list_statement(&inventory(), &columns, 3);
        assert_eq!(
            stmt.as_sql(),
            "SELECT \"id\", \"product_name\", \"quantity\", \"price\"::text AS \"price\", \
             \"branch_id\", \"last_updated\" FROM \"inventory\" ORDER BY 1 DESC LIMIT $1"
        );
    }

    #[test]
    fn test_select_by_id_statement() {
        let all = inventory_columns();
        let stmt = select_by_id_statement(&inventory(), &all[..2], 1);
        assert_eq!(
            stmt.as_sql(),
            "SELECT \"id\", \"product_name\" FROM \"inventory\" WHERE \"id\" = $1"
        );
    }

    #[test]
    fn test_insert_statement() {
        let columns = inventory_columns();
        let body = payload(json!({"product_name": "Widget", "price": "9.99"}));
        let assignments = writable_columns(&columns, &body).unwrap();
        let stmt = insert_statement(&inventory(), &assignments);
        assert_eq!(
            stmt.as_sql(),
            "INSERT INTO \"inventory\" (\"product_name\", \"price\") VALUES \
             (CAST($1 AS \"pg_catalog\".\"varchar\"), CAST($2 AS \"pg_catalog\".\"numeric\")) \
             RETURNING CAST(\"id\" AS int8)"
        );
    }

    #[test]
    fn test_update_statement() {
        let columns = inventory_columns();
        let body = payload(json!({"quantity": 4}));
        let assignments = writable_columns(&columns, &body).unwrap();
        let stmt = update_statement(&inventory(), &assignments, 12);
        assert_eq!(
            stmt.as_sql(),
            "UPDATE \"inventory\" SET \"quantity\" = CAST(CAST($1 AS numeric) AS \"pg_catalog\".\"int4\") \
             WHERE \"id\" = $2"
        );
    }

    #[test]
    fn test_float_valued_numbers_are_cast_through_numeric() {
        let columns = inventory_columns();
        let body = payload(json!({"quantity": 5.0, "price": 9.5}));
        let assignments = writable_columns(&columns, &body).unwrap();
        assert_eq!(assignments[0].value, Value::Number("5.0".into()));
        assert_eq!(assignments[1].value, Value::Number("9.5".into()));

        let stmt = insert_statement(&inventory(), &assignments);
        assert_eq!(
            stmt.as_sql(),
            "INSERT INTO \"inventory\" (\"quantity\", \"price\") VALUES \
             (CAST(CAST($1 AS numeric) AS \"pg_catalog\".\"int4\"), \
             CAST(CAST($2 AS numeric) AS \"pg_catalog\".\"numeric\")) \
             RETURNING CAST(\"id\" AS int8)"
        );
    }

    #[test]
    fn test_delete_statement() {
        let stmt = delete_statement(&TableName::parse("sales").unwrap(), 5);
        assert_eq!(stmt.as_sql(), "DELETE FROM \"sales\" WHERE \"id\" = $1");
    }

    #[test]
    fn test_payload_text_stays_out_of_sql() {
        let columns = inventory_columns();
        let body = payload(json!({"product_name": "x'); DELETE FROM sales; --"}));
        let assignments = writable_columns(&columns, &body).unwrap();
        let stmt = update_statement(&inventory(), &assignments, 1);
        assert!(!stmt.as_sql().contains("DELETE"));
    }

    #[tokio::test]
    async fn test_disallowed_table_never_touches_database() {
        let provider = Arc::new(RefusingProvider::default());
        let store = TableStore::new(provider.clone());
        let body = payload(json!({"name": "x"}));

        for table in ["users", "Inventory", "sync_logs", "inventory; --"] {
            assert!(matches!(
                store.list(table, None).await,
                Err(Error::TableNotAllowed(_))
            ));
            assert!(matches!(
                store.create(table, &body).await,
                Err(Error::TableNotAllowed(_))
            ));
            assert!(matches!(
                store.read(table, 1).await,
                Err(Error::TableNotAllowed(_))
            ));
            assert!(matches!(
                store.update(table, 1, &body).await,
                Err(Error::TableNotAllowed(_))
            ));
            assert!(matches!(
                store.delete(table, 1).await,
                Err(Error::TableNotAllowed(_))
            ));
        }

        assert_eq!(provider.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_table_surfaces_connect_failure() {
        let provider = Arc::new(RefusingProvider::default());
        let store = TableStore::new(provider.clone());

        let err = store.list("inventory", Some(3)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Unavailable {
                branch: Branch::Local,
                ..
            }
        ));
        assert_eq!(provider.attempts.load(Ordering::SeqCst), 1);
        assert!(store
            .catalog()
            .cached(&TableName::parse("inventory").unwrap())
            .is_none());
    }
}
