use anyhow::{anyhow, Context, Result};
use session_gateway::admin::{create_admin_router, AppState};
use session_gateway::config::AppConfig;
use session_gateway::registry::{ConfigStore, SessionRegistry};
use session_gateway::telemetry::RequestLogger;
use session_gateway::transport::HttpOrgResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal gateway error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let store = ConfigStore::discover(AppConfig::default().persist_timeout())
        .context("resolve config locations")?;
    let config_path = store.existing_path();
    let config = AppConfig::load(config_path.as_deref()).context("load configuration")?;
    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded config file"),
        None => warn!("no config.yaml found; using defaults and environment"),
    }

    let store = store.with_timeout(config.persist_timeout());
    let resolver = Arc::new(HttpOrgResolver::new(
        config.upstream_base_url.clone(),
        config.upstream_timeout(),
    ));
    let telemetry =
        Arc::new(RequestLogger::new(config.max_logs).with_models(config.models.clone()));
    let addr: SocketAddr = config
        .address
        .parse()
        .with_context(|| format!("invalid listen address: {}", config.address))?;
    let registry = Arc::new(SessionRegistry::new(config, store, resolver));

    let app = App {
        registry,
        telemetry,
        addr,
    };
    app.run().await
}

struct App {
    registry: Arc<SessionRegistry>,
    telemetry: Arc<RequestLogger>,
    addr: SocketAddr,
}

impl App {
    async fn run(self) -> Result<()> {
        let state = AppState::new(self.registry.clone(), self.telemetry.clone());
        let api_router = create_admin_router(state);

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("bind admin API address {}", self.addr))?;
        let sessions = self.registry.len().await;
        info!(
            address = %self.addr,
            sessions,
            max_logs = self.telemetry.max_logs(),
            "session gateway online"
        );
        let api_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, api_router).await {
                warn!(error = %e, "API server error");
            }
        });

        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = self.telemetry.stats().await;
                    let sessions = self.registry.len().await;
                    let failover_budget = self.registry.failover_budget().await;
                    info!(
                        sessions,
                        failover_budget,
                        total_requests = stats.total_requests,
                        success_rate = stats.success_rate,
                        rpm = stats.rpm,
                        avg_duration_ms = stats.avg_duration_ms,
                        "gateway heartbeat"
                    );
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "ctrl_c listener error");
                    }
                    info!("Shutdown signal received, exiting");
                    break;
                }
            }
        }
        api_handle.abort();
        Ok(())
    }
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
