// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tool-gateway` — the MCP/JSON-RPC-over-HTTP+SSE binary. Resolves
//! [`Settings`] from the environment, connects the
//! database, runs migrations, syncs the startup tool catalog, wires
//! every named component into [`gateway_core::http::AppState`], and
//! serves [`gateway_core::http::router`] until a shutdown signal
//! arrives.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use gateway_core::audit::AuditSink;
use gateway_core::auth::JwtValidator;
use gateway_core::domain::Catalog;
use gateway_core::domain::PolicyConfig;
use gateway_core::gateway::GatewayService;
use gateway_core::http::{self, AppState};
use gateway_core::infrastructure::repositories::{PgAuditSink, PgJobRepository, PgToolRepository};
use gateway_core::infrastructure::Database;
use gateway_core::jobs::JobRunner;
use gateway_core::mcp::{Dispatcher, DispatcherDeps};
use gateway_core::policy::PolicyEngine;
use gateway_core::proxy::BackendProxy;
use gateway_core::ratelimit::{RateLimitConfig, RateLimiter};
use gateway_core::registry::ToolRegistry;
use gateway_core::Settings;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Global process flags, separate from [`Settings`]'s environment-resolved
/// runtime options. A handful of `clap` flags with env fallback layered
/// on top of the env-driven configuration proper.
#[derive(Parser)]
#[command(name = "tool-gateway", version, about = "MCP tool invocation gateway")]
struct Cli {
    /// Apply pending database migrations and exit without serving
    /// traffic, folded into a flag since this binary has no subcommands.
    #[arg(long, env = "GATEWAY_MIGRATE_ONLY")]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::from_env().context("failed to resolve settings from environment")?;
    init_logging(&settings.log_format);

    info!(app = %settings.app_name, "starting tool-gateway");

    let database = Database::connect(&settings.database_url, 10)
        .await
        .context("failed to connect to the database")?;

    info!("running pending migrations");
    MIGRATOR
        .run(database.pool())
        .await
        .context("failed to run database migrations")?;

    if cli.migrate_only {
        info!("--migrate-only set, exiting after migrations");
        return Ok(());
    }

    init_metrics(&settings.metrics_addr)?;

    let settings = Arc::new(settings);

    let jwt_validator = Arc::new(
        JwtValidator::from_settings(&settings).context("failed to build JWT validator")?,
    );

    let policy_config = match &settings.policy_path {
        Some(path) => PolicyEngine::load_from_path(path)
            .with_context(|| format!("failed to load policy file {path:?}"))?,
        None => {
            tracing::warn!("GATEWAY_POLICY_PATH not set, starting with a default-deny policy");
            PolicyConfig::default()
        }
    };
    let policy = Arc::new(PolicyEngine::new(policy_config));

    let tool_repository = Arc::new(PgToolRepository::new(database.pool().clone()));
    let registry = Arc::new(ToolRegistry::new(tool_repository, settings.registry_ttl));

    if let Some(path) = &settings.catalog_path {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog file {path:?}"))?;
        let catalog: Catalog = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse catalog file {path:?}"))?;
        info!(tools = catalog.tools.len(), "syncing startup catalog");
        registry
            .sync_catalog(&catalog)
            .await
            .context("failed to sync startup catalog")?;
    } else {
        tracing::warn!("GATEWAY_CATALOG_PATH not set, starting with an empty tool catalog");
    }

    let audit_sink = Arc::new(PgAuditSink::new(database.pool().clone()));
    let audit_trait_object: Arc<dyn AuditSink> = audit_sink.clone();

    let proxy = Arc::new(BackendProxy::new(
        settings.tool_gateway_shared_secret.clone(),
        settings.backend_timeout,
    ));

    let gateway = Arc::new(GatewayService::new(
        registry.clone(),
        policy.clone(),
        proxy.clone(),
        audit_trait_object.clone(),
        settings.max_payload_bytes,
    ));

    let rate_limiter = Arc::new(RateLimiter::new());
    let user_rate_limit = RateLimitConfig {
        requests_per_minute: settings.rate_limit_user_rpm,
        burst_size: settings.rate_limit_user_burst,
    };
    let tool_rate_limit = RateLimitConfig {
        requests_per_minute: settings.rate_limit_tool_rpm,
        burst_size: settings.rate_limit_tool_burst,
    };

    let dispatcher = Arc::new(Dispatcher::new(DispatcherDeps {
        registry: registry.clone(),
        policy: policy.clone(),
        rate_limiter: rate_limiter.clone(),
        gateway: gateway.clone(),
        audit_sink: audit_trait_object.clone(),
        user_rate_limit,
        tool_rate_limit,
        server_name: "tool-gateway".to_string(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    }));

    let job_repository = Arc::new(PgJobRepository::new(database.pool().clone()));
    let job_runner = Arc::new(JobRunner::new(job_repository, gateway.clone()));

    let state = Arc::new(AppState {
        settings: settings.clone(),
        jwt_validator,
        policy,
        registry,
        rate_limiter,
        user_rate_limit,
        tool_rate_limit,
        gateway,
        dispatcher,
        job_runner,
        audit_sink: audit_trait_object,
        audit_query: audit_sink,
    });

    let app = http::router(state);

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {:?}", settings.bind_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "tool-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("tool-gateway shutting down");
    Ok(())
}

fn init_logging(format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if format.eq_ignore_ascii_case("json") {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }
}

fn init_metrics(addr: &str) -> Result<()> {
    let socket_addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid metrics address {addr:?}"))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .install()
        .context("failed to install Prometheus metrics exporter")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
