//! Schema catalog cache
//!
//! Column lists are read from `information_schema.columns` the first time a
//! table is used and kept for the life of the process, including an empty
//! list for a table the catalog does not know. Concurrent first
//! lookups may both query the catalog; the query is deterministic, so the
//! last writer simply wins.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{debug, warn};

use super::identifier::{Identifier, TableName};
use crate::error::Result;

/// Coarse classification of a column's type as reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Bytea,
    /// Anything the row decoder has no native mapping for
    Other,
}

impl PgType {
    /// Number types that accept any JSON number through a `numeric` cast
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            PgType::Int2
                | PgType::Int4
                | PgType::Int8
                | PgType::Float4
                | PgType::Float8
                | PgType::Numeric
        )
    }

    pub fn from_catalog(udt_schema: &str, udt_name: &str) -> Self {
        if udt_schema != "pg_catalog" {
            return PgType::Other;
        }
        match udt_name {
            "bool" => PgType::Bool,
            "int2" => PgType::Int2,
            "int4" => PgType::Int4,
            "int8" => PgType::Int8,
            "float4" => PgType::Float4,
            "float8" => PgType::Float8,
            "numeric" => PgType::Numeric,
            "text" | "varchar" | "bpchar" | "name" => PgType::Text,
            "json" | "jsonb" => PgType::Json,
            "uuid" => PgType::Uuid,
            "timestamp" => PgType::Timestamp,
            "timestamptz" => PgType::TimestampTz,
            "date" => PgType::Date,
            "time" => PgType::Time,
            "bytea" => PgType::Bytea,
            _ => PgType::Other,
        }
    }
}

/// A column as reported by catalog metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub udt_schema: String,
    pub udt_name: String,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        udt_schema: impl Into<String>,
        udt_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            udt_schema: udt_schema.into(),
            udt_name: udt_name.into(),
        }
    }

    pub fn identifier(&self) -> Identifier {
        Identifier::column(&self.name)
    }

    /// The column's type, for use in `CAST(... AS <type>)`
    pub fn type_identifier(&self) -> Identifier {
        Identifier::qualified(&self.udt_schema, &self.udt_name)
    }

    pub fn pg_type(&self) -> PgType {
        PgType::from_catalog(&self.udt_schema, &self.udt_name)
    }

    /// Numeric columns are read as text to keep their exact digits; other
    /// unmapped types are read as text so the serializer stays total.
    pub fn selects_as_text(&self) -> bool {
        matches!(self.pg_type(), PgType::Numeric | PgType::Other)
    }
}

/// Source of column metadata
#[async_trait]
pub trait CatalogLoader: Send {
    async fn load_columns(&mut self, table: &TableName) -> Result<Vec<ColumnDescriptor>>;
}

#[async_trait]
impl CatalogLoader for PgConnection {
    async fn load_columns(&mut self, table: &TableName) -> Result<Vec<ColumnDescriptor>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT column_name::text, udt_schema::text, udt_name::text
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table.as_str())
        .fetch_all(&mut *self)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, udt_schema, udt_name)| ColumnDescriptor::new(name, udt_schema, udt_name))
            .collect())
    }
}

/// Process-wide table → ordered column list cache
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    columns: RwLock<HashMap<&'static str, Arc<[ColumnDescriptor]>>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered columns of `table`, loading them on first use.
    ///
    /// Failures are propagated and leave the cache untouched. An empty
    /// result is cached like any other; a table created after start-up is
    /// only picked up by a restart.
    pub async fn columns<L>(&self, table: &TableName, loader: &mut L) -> Result<Arc<[ColumnDescriptor]>>
    where
        L: CatalogLoader + ?Sized,
    {
        if let Some(cached) = self.cached(table) {
            return Ok(cached);
        }

        let loaded: Arc<[ColumnDescriptor]> = loader.load_columns(table).await?.into();
        if loaded.is_empty() {
            warn!("Catalog reports no columns for table {}", table);
        }

        debug!("Cached {} columns for table {}", loaded.len(), table);
        self.columns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.as_str(), Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn cached(&self, table: &TableName) -> Option<Arc<[ColumnDescriptor]>> {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table.as_str())
            .cloned()
    }
}
