//! Row decoding and JSON serialization
//!
//! A fetched row is first decoded positionally into [`RawValue`]s, then
//! turned into a JSON object keyed by column name. Dates and times become
//! ISO-8601 strings, decimals keep their exact digits as strings, and
//! nothing in the conversion can fail.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value as JsonValue};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Column, Decode, Row, Type, TypeInfo};
use uuid::Uuid;

use crate::error::Result;

/// A single column value as it came off the wire
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Decimal(BigDecimal),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Uuid(Uuid),
    Json(JsonValue),
    Bytes(Vec<u8>),
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    Ok(row.try_get::<Option<T>, _>(index)?)
}

impl RawValue {
    /// Decode column `index` of `row` according to its reported type
    pub fn decode(row: &PgRow, index: usize) -> Result<Self> {
        let type_name = row.column(index).type_info().name();

        let value = match type_name {
            "BOOL" => get::<bool>(row, index)?.map(RawValue::Bool),
            "INT2" => get::<i16>(row, index)?.map(|n| RawValue::Int(n.into())),
            "INT4" => get::<i32>(row, index)?.map(|n| RawValue::Int(n.into())),
            "INT8" => get::<i64>(row, index)?.map(RawValue::Int),
            "FLOAT4" => get::<f32>(row, index)?.map(|f| RawValue::Float(f.into())),
            "FLOAT8" => get::<f64>(row, index)?.map(RawValue::Float),
            "NUMERIC" => get::<BigDecimal>(row, index)?.map(RawValue::Decimal),
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
                get::<String>(row, index)?.map(RawValue::Text)
            }
            "JSON" | "JSONB" => get::<JsonValue>(row, index)?.map(RawValue::Json),
            "UUID" => get::<Uuid>(row, index)?.map(RawValue::Uuid),
            "TIMESTAMP" => get::<NaiveDateTime>(row, index)?.map(RawValue::Timestamp),
            "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, index)?.map(RawValue::TimestampTz),
            "DATE" => get::<NaiveDate>(row, index)?.map(RawValue::Date),
            "TIME" => get::<NaiveTime>(row, index)?.map(RawValue::Time),
            "BYTEA" => get::<Vec<u8>>(row, index)?.map(RawValue::Bytes),
            // Enum labels and text-like extension types arrive as plain
            // bytes; anything else is kept as raw bytes.
            _ => match row.try_get_unchecked::<Option<String>, _>(index) {
                Ok(text) => text.map(RawValue::Text),
                Err(_) => row
                    .try_get_unchecked::<Option<Vec<u8>>, _>(index)
                    .ok()
                    .flatten()
                    .map(RawValue::Bytes),
            },
        };

        Ok(value.unwrap_or(RawValue::Null))
    }

    pub fn into_json(self) -> JsonValue {
        match self {
            RawValue::Null => JsonValue::Null,
            RawValue::Bool(b) => JsonValue::Bool(b),
            RawValue::Int(n) => JsonValue::Number(n.into()),
            RawValue::Float(f) => Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            RawValue::Text(s) => JsonValue::String(s),
            RawValue::Decimal(d) => JsonValue::String(d.to_string()),
            RawValue::Timestamp(ts) => {
                JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            RawValue::TimestampTz(ts) => JsonValue::String(ts.to_rfc3339()),
            RawValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            RawValue::Time(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
            RawValue::Uuid(u) => JsonValue::String(u.to_string()),
            RawValue::Json(j) => j,
            RawValue::Bytes(b) => JsonValue::String(format!("\\x{}", hex::encode(b))),
        }
    }
}

/// Decode every column of `row`, in order
pub fn decode_row(row: &PgRow) -> Result<Vec<RawValue>> {
    (0..row.len()).map(|i| RawValue::decode(row, i)).collect()
}

/// Pair column names with decoded values positionally
pub fn to_json<'a>(
    columns: impl IntoIterator<Item = &'a str>,
    values: Vec<RawValue>,
) -> Map<String, JsonValue> {
    columns
        .into_iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), value.into_json()))
        .collect()
}
