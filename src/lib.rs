//! ERP sync dashboard
//!
//! A monitoring dashboard and REST facade over two PostgreSQL databases,
//! Branch-A (local) and Branch-B (remote), that an external job keeps in
//! sync. The core is a schema-driven CRUD layer restricted to the
//! replicated tables: column lists come from the catalog at runtime, every
//! identifier is quoted and every caller value is bound.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use erp_sync_dashboard::config::DatabaseConfig;
//! use erp_sync_dashboard::database::{PgConnector, TableStore};
//!
//! # async fn run() -> erp_sync_dashboard::error::Result<()> {
//! let connector = PgConnector::new(&DatabaseConfig::from_env());
//! let store = TableStore::new(Arc::new(connector));
//! let rows = store.list("inventory", Some(10)).await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Connection settings
pub mod config;

// Catalog cache, statement building, CRUD engine and dashboard reads
pub mod database;

// REST API (axum)
#[cfg(feature = "server")]
pub mod api;

pub use config::DatabaseConfig;
pub use database::{Branch, ConnectionProvider, DashboardService, PgConnector, TableStore};
pub use error::{Error, ErrorKind, Result};
