//! Database configuration
//!
//! Both branches share one set of credentials and one database name; only
//! the host differs. Values come from the environment (a `.env` file is
//! honoured by the binary through `dotenvy`).

use std::time::Duration;

pub const DEFAULT_LOCAL_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for Branch-A (local) and Branch-B (remote)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub port: u16,
    pub local_host: String,
    /// `None` when Branch-B is not configured
    pub remote_host: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            dbname: String::new(),
            port: DEFAULT_PORT,
            local_host: DEFAULT_LOCAL_HOST.to_string(),
            remote_host: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl DatabaseConfig {
    /// Build the configuration from `ERP_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            user: lookup("ERP_DB_USER").unwrap_or_default(),
            password: lookup("ERP_DB_PASS").unwrap_or_default(),
            dbname: lookup("ERP_DB_NAME").unwrap_or_default(),
            port: lookup("ERP_DB_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            local_host: lookup("ERP_LOCAL_DB_HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.local_host),
            remote_host: lookup("ERP_REMOTE_DB_HOST").filter(|h| !h.trim().is_empty()),
            connect_timeout: lookup("ERP_DB_CONNECT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }
}
