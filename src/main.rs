// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Anonymous Inbox Service
//!
//! Receives anonymous messages through a public link and serves them back
//! only to the holder of the owner's capability token.
//!
//! - 10 sends per 60s per address (default)
//! - 1 send per 300s for addresses flagged by the spam heuristic
//! - Redis-backed shared counters with a process-local fallback
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (a `.env` file is
//! read first when present):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `REDIS_URL`: Shared store URL (default: redis://127.0.0.1:6379/)
//! - `STORE_TIMEOUT_MS`: Per-call store timeout (default: 1000)
//! - `STANDARD_LIMIT` / `STANDARD_WINDOW_SECS`: Standard tier (default: 10 / 60)
//! - `SUSPICIOUS_LIMIT` / `SUSPICIOUS_WINDOW_SECS`: Suspicious tier (default: 1 / 300)
//! - `MAILBOX_PAGE_SIZE`: Mailbox read cap (default: 50)
//! - `TRUST_FORWARDED_FOR`: Use `X-Forwarded-For` for the client address (default: false)

use anyhow::Context;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use anon_inbox::{
    config::Config,
    handlers::{router, AppState},
    metrics::Metrics,
    repository::{InMemoryRepository, MessageRepository},
    store::{CounterStore, MemoryStore, RedisStore},
    AbuseController, OwnershipAuthorizer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "No .env file loaded");
    }

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        standard_limit = config.rate_limit.standard.limit,
        standard_window_secs = config.rate_limit.standard.window_secs,
        suspicious_limit = config.rate_limit.suspicious.limit,
        suspicious_window_secs = config.rate_limit.suspicious.window_secs,
        store_timeout_ms = config.store.timeout_ms,
        "Starting anonymous inbox"
    );

    // Stores: shared Redis (lazy connect) plus local fallback
    let shared: Arc<dyn CounterStore> = Arc::new(
        RedisStore::new(&config.store.redis_url, config.store.timeout())
            .context("invalid REDIS_URL")?,
    );
    let local = Arc::new(MemoryStore::new(config.store.local_max_keys));

    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
    let repository: Arc<dyn MessageRepository> = Arc::new(InMemoryRepository::new());

    let controller = AbuseController::from_config(
        &config,
        shared,
        local.clone(),
        repository.clone(),
        metrics.clone(),
    )
    .context("invalid rate limit configuration")?;
    let authorizer = OwnershipAuthorizer::from_config(&config, repository.clone(), metrics.clone());

    let state = Arc::new(AppState {
        controller,
        authorizer,
        repository,
        metrics,
        config: config.clone(),
    });

    // Spawn cleanup task
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            local.purge_expired().await;
        }
    });

    // Build router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let mut config = Config::default();

    if let Ok(bind_addr) = std::env::var("BIND_ADDR") {
        config.bind_addr = bind_addr;
    }
    if let Ok(redis_url) = std::env::var("REDIS_URL") {
        config.store.redis_url = redis_url;
    }
    override_from_env("STORE_TIMEOUT_MS", &mut config.store.timeout_ms);
    override_from_env("STANDARD_LIMIT", &mut config.rate_limit.standard.limit);
    override_from_env("STANDARD_WINDOW_SECS", &mut config.rate_limit.standard.window_secs);
    override_from_env("SUSPICIOUS_LIMIT", &mut config.rate_limit.suspicious.limit);
    override_from_env(
        "SUSPICIOUS_WINDOW_SECS",
        &mut config.rate_limit.suspicious.window_secs,
    );
    override_from_env("MAILBOX_PAGE_SIZE", &mut config.mailbox.page_size);
    override_from_env("TRUST_FORWARDED_FOR", &mut config.trust_forwarded_for);

    config
}

fn override_from_env<T: FromStr>(name: &str, target: &mut T) {
    if let Some(value) = std::env::var(name).ok().and_then(|v| v.parse().ok()) {
        *target = value;
    }
}
