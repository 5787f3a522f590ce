//! ERP sync dashboard server
//!
//! Serves the dashboard page, its JSON feeds and the generic table API.
//!
//! ## Usage
//!
//! ```bash
//! ERP_DB_USER=erp ERP_DB_PASS=secret ERP_DB_NAME=erp \
//! ERP_REMOTE_DB_HOST=10.0.0.2 cargo run --bin erp_dashboard
//!
//! curl http://localhost:8080/health
//! curl http://localhost:8080/api/sales?limit=5
//! curl -X POST http://localhost:8080/api/inventory \
//!   -H "Content-Type: application/json" \
//!   -d '{"product_name": "Widget", "quantity": 5, "price": "9.99"}'
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use erp_sync_dashboard::api::{create_router, AppState};
use erp_sync_dashboard::config::DatabaseConfig;
use erp_sync_dashboard::database::PgConnector;

#[derive(Parser, Debug)]
#[command(name = "erp_dashboard")]
#[command(about = "Sync dashboard and REST API over the Branch-A/Branch-B databases")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "ERP_DASHBOARD_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Branch-A host
    #[arg(long, env = "ERP_LOCAL_DB_HOST")]
    local_host: Option<String>,

    /// Branch-B host
    #[arg(long, env = "ERP_REMOTE_DB_HOST")]
    remote_host: Option<String>,

    #[arg(long, env = "ERP_DB_PORT")]
    port: Option<u16>,

    /// Connect timeout per attempt, in seconds
    #[arg(long, env = "ERP_DB_CONNECT_TIMEOUT_SECS")]
    connect_timeout: Option<u64>,
}

impl Args {
    fn database_config(&self) -> DatabaseConfig {
        let mut config = DatabaseConfig::from_env();
        if let Some(host) = self.local_host.as_deref().filter(|h| !h.trim().is_empty()) {
            config.local_host = host.to_string();
        }
        if let Some(host) = &self.remote_host {
            config.remote_host = Some(host.clone()).filter(|h| !h.trim().is_empty());
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "erp_sync_dashboard=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = args.database_config();

    info!(
        "Branch-A at {}:{}, Branch-B at {}",
        config.local_host,
        config.port,
        config.remote_host.as_deref().unwrap_or("(not configured)")
    );

    let connector = PgConnector::new(&config);
    let app = create_router(AppState::new(Arc::new(connector)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!("Dashboard listening on http://{}", args.bind);

    axum::serve(listener, app).await?;
    Ok(())
}
