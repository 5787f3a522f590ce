//! Database connection and management module
//!
//! Every request opens its own connection to the branch it needs and
//! releases it before returning. There is no pool: the remote branch is
//! reached over an unreliable link, and a short connect timeout bounds how
//! long a request can wait on it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

pub mod catalog;
pub mod crud;
pub mod dashboard;
pub mod identifier;
pub mod row;
pub mod statement;

pub use catalog::{CatalogLoader, ColumnDescriptor, PgType, SchemaCatalog};
pub use crud::{TableStore, DEFAULT_LIST_LIMIT};
pub use dashboard::DashboardService;
pub use identifier::{is_table_allowed, quote_identifier, Identifier, TableName, ALLOWED_TABLES};
pub use row::{decode_row, to_json, RawValue};
pub use statement::{Statement, Value};

/// One of the two databases kept in sync by the external replication job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Branch-A, the local database; the only write target
    Local,
    /// Branch-B, the remote database; read only from here
    Remote,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Branch::Local, Branch::Remote];

    /// Key used in JSON aggregates (`branch_a` / `branch_b`)
    pub fn key(self) -> &'static str {
        match self {
            Branch::Local => "branch_a",
            Branch::Remote => "branch_b",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Local => write!(f, "BRANCH-A"),
            Branch::Remote => write!(f, "BRANCH-B"),
        }
    }
}

/// Opens request-scoped connections to a branch
///
/// The caller owns the returned connection for the duration of one request.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self, branch: Branch) -> Result<PgConnection>;
}

/// Connection provider backed by real PostgreSQL servers
#[derive(Debug, Clone)]
pub struct PgConnector {
    local: PgConnectOptions,
    remote: Option<PgConnectOptions>,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options_for = |host: &str| {
            let mut options = PgConnectOptions::new().host(host).port(config.port);
            if !config.user.is_empty() {
                options = options.username(&config.user);
            }
            if !config.password.is_empty() {
                options = options.password(&config.password);
            }
            if !config.dbname.is_empty() {
                options = options.database(&config.dbname);
            }
            options
        };

        Self {
            local: options_for(&config.local_host),
            remote: config.remote_host.as_deref().map(options_for),
            connect_timeout: config.connect_timeout,
        }
    }

    /// Build a connector from connection URLs (used by tests and tooling)
    pub fn from_urls(local: &str, remote: Option<&str>, connect_timeout: Duration) -> Result<Self> {
        Ok(Self {
            local: PgConnectOptions::from_str(local)?,
            remote: remote.map(PgConnectOptions::from_str).transpose()?,
            connect_timeout,
        })
    }

    fn options(&self, branch: Branch) -> Option<&PgConnectOptions> {
        match branch {
            Branch::Local => Some(&self.local),
            Branch::Remote => self.remote.as_ref(),
        }
    }
}

#[async_trait]
impl ConnectionProvider for PgConnector {
    async fn connect(&self, branch: Branch) -> Result<PgConnection> {
        let options = self.options(branch).ok_or_else(|| Error::Unavailable {
            branch,
            reason: "host not configured".to_string(),
        })?;

        debug!("Connecting to {} at {}", branch, options.get_host());

        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(options)).await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                warn!("Failed to connect to {}: {}", branch, e);
                Err(Error::Unavailable {
                    branch,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    "Connect to {} timed out after {:?}",
                    branch, self.connect_timeout
                );
                Err(Error::Unavailable {
                    branch,
                    reason: format!("connect timed out after {:?}", self.connect_timeout),
                })
            }
        }
    }
}

/// Close a connection, logging instead of failing if the goodbye is lost
pub async fn release(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        debug!("Error while closing connection: {}", e);
    }
}
