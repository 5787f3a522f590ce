//! Parameterized statement builder
//!
//! A thin wrapper over [`sqlx::QueryBuilder`] with a narrower surface:
//! statement text can only grow by `&'static str` fragments written in
//! this crate or by an [`Identifier`]. Everything that came from a caller
//! goes through [`Statement::value`] and is sent as a bind parameter.

use serde_json::Value as JsonValue;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Postgres, QueryBuilder};

use super::catalog::{ColumnDescriptor, PgType};
use super::identifier::Identifier;

/// A bind parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    /// Text form of a caller value; the server casts it to the column type
    Text(Option<String>),
    /// A JSON number bound for a number column, read as `numeric` first so
    /// that `5.0` can populate an integer column
    Number(String),
}

impl Value {
    /// Text form of a JSON payload value destined for `column`
    pub fn from_json(value: &JsonValue, column: &ColumnDescriptor) -> Self {
        match value {
            JsonValue::Null => Value::Text(None),
            _ if column.pg_type() == PgType::Json => Value::Text(Some(value.to_string())),
            JsonValue::Number(n) if column.pg_type().is_numeric() => Value::Number(n.to_string()),
            JsonValue::String(s) => Value::Text(Some(s.clone())),
            other => Value::Text(Some(other.to_string())),
        }
    }
}

/// SQL statement under construction
pub struct Statement {
    builder: QueryBuilder<'static, Postgres>,
}

impl Statement {
    pub fn new(sql: &'static str) -> Self {
        Self {
            builder: QueryBuilder::new(sql),
        }
    }

    pub fn sql(&mut self, fragment: &'static str) -> &mut Self {
        self.builder.push(fragment);
        self
    }

    pub fn identifier(&mut self, identifier: &Identifier) -> &mut Self {
        self.builder.push(identifier.as_sql());
        self
    }

    pub fn value(&mut self, value: Value) -> &mut Self {
        match value {
            Value::Int(n) => self.builder.push_bind(n),
            Value::Text(s) => self.builder.push_bind(s),
            Value::Number(s) => self.builder.push_bind(s),
        };
        self
    }

    /// `CAST($n AS <type>)`, or `CAST(CAST($n AS numeric) AS <type>)` for numbers
    pub fn cast_value(&mut self, value: Value, type_name: &Identifier) -> &mut Self {
        self.builder.push("CAST(");
        if matches!(value, Value::Number(_)) {
            self.builder.push("CAST(");
            self.value(value);
            self.builder.push(" AS numeric)");
        } else {
            self.value(value);
        }
        self.builder.push(" AS ");
        self.builder.push(type_name.as_sql());
        self.builder.push(")");
        self
    }

    /// Comma-separated select list; text-read columns keep their name
    pub fn select_list(&mut self, columns: &[ColumnDescriptor]) -> &mut Self {
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.builder.push(", ");
            }
            let identifier = column.identifier();
            self.builder.push(identifier.as_sql());
            if column.selects_as_text() {
                self.builder.push("::text AS ");
                self.builder.push(identifier.as_sql());
            }
        }
        self
    }

    pub fn as_sql(&self) -> &str {
        self.builder.sql()
    }

    pub fn build(&mut self) -> Query<'_, Postgres, PgArguments> {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, udt: &str) -> ColumnDescriptor {
        ColumnDescriptor::new(name, "pg_catalog", udt)
    }

    #[test]
    fn test_placeholders_are_numbered() {
        let mut stmt = Statement::new("SELECT ");
        stmt.value(Value::Int(1))
            .sql(", ")
            .value(Value::Text(Some("x".into())));
        assert_eq!(stmt.as_sql(), "SELECT $1, $2");
    }

    #[test]
    fn test_cast_value_uses_quoted_type() {
        let price = column("price", "numeric");
        let mut stmt = Statement::new("SELECT ");
        stmt.cast_value(Value::Text(Some("9.99".into())), &price.type_identifier());
        assert_eq!(stmt.as_sql(), "SELECT CAST($1 AS \"pg_catalog\".\"numeric\")");
    }

    #[test]
    fn test_numbers_pass_through_numeric() {
        let quantity = column("quantity", "int4");
        let value = Value::from_json(&json!(5.0), &quantity);
        assert_eq!(value, Value::Number("5.0".into()));

        let mut stmt = Statement::new("SELECT ");
        stmt.cast_value(value, &quantity.type_identifier());
        assert_eq!(
            stmt.as_sql(),
            "SELECT CAST(CAST($1 AS numeric) AS \"pg_catalog\".\"int4\")"
        );
    }

    #[test]
    fn test_select_list_reads_numeric_as_text() {
        let mut stmt = Statement::new("SELECT ");
        stmt.select_list(&[column("id", "int4"), column("price", "numeric")]);
        assert_eq!(
            stmt.as_sql(),
            "SELECT \"id\", \"price\"::text AS \"price\""
        );
    }

    #[test]
    fn test_bound_text_never_reaches_sql() {
        let payload = "'; DROP TABLE sales; --";
        let mut stmt = Statement::new("UPDATE ");
        stmt.value(Value::Text(Some(payload.into())));
        assert!(!stmt.as_sql().contains("DROP"));
    }

    #[test]
    fn test_value_from_json() {
        let text = column("product_name", "varchar");
        let doc = column("attrs", "jsonb");

        assert_eq!(
            Value::from_json(&json!("Widget"), &text),
            Value::Text(Some("Widget".into()))
        );
        assert_eq!(
            Value::from_json(&json!(5), &text),
            Value::Text(Some("5".into()))
        );
        assert_eq!(
            Value::from_json(&json!(9.5), &column("price", "numeric")),
            Value::Number("9.5".into())
        );
        assert_eq!(
            Value::from_json(&json!("9.99"), &column("price", "numeric")),
            Value::Text(Some("9.99".into()))
        );
        assert_eq!(
            Value::from_json(&json!(true), &text),
            Value::Text(Some("true".into()))
        );
        assert_eq!(Value::from_json(&json!(null), &text), Value::Text(None));
        assert_eq!(
            Value::from_json(&json!("Widget"), &doc),
            Value::Text(Some("\"Widget\"".into()))
        );
        assert_eq!(
            Value::from_json(&json!({"a": 1}), &doc),
            Value::Text(Some("{\"a\":1}".into()))
        );
    }
}
