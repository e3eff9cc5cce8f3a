//! Faultline server: wires the registry, shard pool and HTTP surfaces.

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use faultline_core::IdentityProvider;
use faultline_database::{establish_registry, ShardManager};
use faultline_error_tracking::services::{IngestionService, IssueQueryService, StatsService};
use faultline_error_tracking::{ingest, management};
use faultline_projects::{handlers as project_handlers, ProjectRegistry, RegistryService};

mod auth;
mod config;

use auth::{require_user, StaticTokenIdentity};
use config::ServerConfig;

fn main() {
    init_tracing();

    let config = ServerConfig::from_env();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to create runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        tracing::error!(error = %e, "startup error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let registry_db = establish_registry(&config.data_dir).await?;
    let shards = Arc::new(ShardManager::new(
        config.data_dir.clone(),
        config.shard_pool_size,
    ));

    let registry = Arc::new(RegistryService::new(registry_db, shards.clone()));
    let registry_dyn: Arc<dyn ProjectRegistry> = registry.clone();
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(StaticTokenIdentity::new(config.api_tokens.clone()));

    if config.api_tokens.is_empty() {
        tracing::warn!("FAULTLINE_API_TOKENS is empty, the management API will reject all calls");
    }

    let ingest_routes = ingest::configure_routes().with_state(Arc::new(ingest::AppState {
        registry: registry_dyn.clone(),
        ingestion: Arc::new(IngestionService::new(shards.clone())),
        max_body_bytes: config.max_body_bytes,
    }));

    let management_routes = management::configure_routes()
        .with_state(Arc::new(management::AppState {
            registry: registry_dyn,
            issues: Arc::new(IssueQueryService::new(shards.clone())),
            stats: Arc::new(StatsService::new(shards.clone())),
        }))
        .merge(
            project_handlers::configure_routes().with_state(Arc::new(
                project_handlers::AppState {
                    registry,
                    public_base_url: config.public_base_url.clone(),
                },
            )),
        )
        .layer(middleware::from_fn_with_state(identity, require_user));

    let app = Router::new()
        .nest("/api", ingest_routes.merge(management_routes))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "faultline listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    }
    tracing::info!("shutting down");
}
