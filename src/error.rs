//! Error handling for the sync dashboard
//!
//! Every failure the dynamic table layer can produce is one of three kinds:
//! a validation problem with the request, a missing row, or a data store
//! failure. The HTTP layer maps the kind to a status code; the dashboard
//! glue uses [`Error::is_degradable`] to decide when a read may fall back
//! to a default value.

use std::fmt;

use thiserror::Error;

use crate::database::Branch;

/// Main error type for the dashboard and the dynamic CRUD engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("table not allowed")]
    TableNotAllowed(String),

    #[error("no valid columns")]
    NoValidColumns,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("not found")]
    NotFound,

    #[error("{branch} unavailable: {reason}")]
    Unavailable { branch: Branch, reason: String },

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("table \"{0}\" has no visible columns")]
    EmptySchema(String),
}

/// Coarse classification used for status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DataStore,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::DataStore => write!(f, "data_store"),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TableNotAllowed(_) | Error::NoValidColumns | Error::InvalidRequest(_) => {
                ErrorKind::Validation
            }
            Error::NotFound => ErrorKind::NotFound,
            Error::Unavailable { .. } | Error::Database(_) | Error::EmptySchema(_) => {
                ErrorKind::DataStore
            }
        }
    }

    /// Failures a read-only aggregation view may replace with a default.
    ///
    /// Connection problems and SQL errors reported by the server qualify;
    /// decode failures and caller mistakes never do.
    pub fn is_degradable(&self) -> bool {
        match self {
            Error::Unavailable { .. } => true,
            Error::Database(e) => matches!(
                e,
                sqlx::Error::Database(_)
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::TableNotAllowed("users".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::NoValidColumns.kind(), ErrorKind::Validation);
        assert_eq!(Error::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::DataStore
        );
        assert_eq!(
            Error::EmptySchema("sales".into()).kind(),
            ErrorKind::DataStore
        );
    }

    #[test]
    fn test_messages_match_wire_format() {
        assert_eq!(
            Error::TableNotAllowed("users".into()).to_string(),
            "table not allowed"
        );
        assert_eq!(Error::NoValidColumns.to_string(), "no valid columns");
        assert_eq!(Error::NotFound.to_string(), "not found");
    }

    #[test]
    fn test_degradable_is_enumerated() {
        let unavailable = Error::Unavailable {
            branch: Branch::Remote,
            reason: "connect timed out".into(),
        };
        assert!(unavailable.is_degradable());
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_degradable());

        assert!(!Error::Database(sqlx::Error::RowNotFound).is_degradable());
        assert!(!Error::Database(sqlx::Error::ColumnNotFound("x".into())).is_degradable());
        assert!(!Error::NoValidColumns.is_degradable());
        assert!(!Error::NotFound.is_degradable());
    }
}
