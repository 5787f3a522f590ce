//! Table allowlist and identifier quoting
//!
//! SQL text generated by this crate may only contain names that were either
//! checked against [`ALLOWED_TABLES`] or reported by the catalog. Such names
//! become an [`Identifier`], which always renders double-quoted with embedded
//! quotes doubled. Caller data never becomes an identifier; it is bound.

use std::fmt;

use crate::error::{Error, Result};

/// Tables exposed through the generic CRUD surface
pub const ALLOWED_TABLES: &[&str] = &["inventory", "sales"];

/// Exact, case-sensitive membership test against [`ALLOWED_TABLES`]
pub fn is_table_allowed(name: &str) -> bool {
    ALLOWED_TABLES.contains(&name)
}

/// Wrap `name` in double quotes, doubling any embedded double quote
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// A table name that passed the allowlist check
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(&'static str);

impl TableName {
    pub fn parse(name: &str) -> Result<Self> {
        ALLOWED_TABLES
            .iter()
            .copied()
            .find(|allowed| *allowed == name)
            .map(TableName)
            .ok_or_else(|| Error::TableNotAllowed(name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A quoted SQL name, safe to splice into statement text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    pub fn table(table: &TableName) -> Self {
        Identifier(quote_identifier(table.as_str()))
    }

    /// Only the catalog hands out column names, see `ColumnDescriptor::identifier`
    pub(crate) fn column(name: &str) -> Self {
        Identifier(quote_identifier(name))
    }

    /// The conventional integer primary key
    pub fn primary_key() -> Self {
        Identifier(quote_identifier("id"))
    }

    /// Schema-qualified type name taken from catalog metadata
    pub(crate) fn qualified(schema: &str, name: &str) -> Self {
        Identifier(format!(
            "{}.{}",
            quote_identifier(schema),
            quote_identifier(name)
        ))
    }

    pub fn as_sql(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
