mod config;
mod error;
mod handler;
mod http;
mod process;
mod server;
mod upstream;

use std::sync::{atomic::AtomicU64, Arc};

use ::http::HeaderValue;
use anyhow::Context;
use process::{shell::ShellCommandRunner, CommandRunner};
use server::Server;
use tracing_subscriber::EnvFilter;
use upstream::PooledClient;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::load().context("failed to load configuration")?;
    let server_address = config.server_address.clone();
    let max_connections = config.max_connections;
    let connection_timeout = config.connection_timeout();

    let state = AppState::new(config)?;
    let server = Server::new(state, handler::route_request)
        .with_max_connections(max_connections)
        .with_timeout(connection_timeout);

    if let Err(err) = server.bind(&server_address).await {
        tracing::error!(%err, "server failed");
        return Err(err).context("server failed");
    }

    Ok(())
}

/// Everything a handler may touch. Cloned per request; the heavy parts are
/// shared behind `Arc`s and built exactly once.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub redirect_location: HeaderValue,
    pub runner: Arc<dyn CommandRunner + Send + Sync>,
    pub client: PooledClient,
    /// Requests seen by `/count` on this instance only. Other instances keep
    /// their own count, so this is never a global total.
    pub invocations: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let runner = ShellCommandRunner::new(config.shell.clone());
        Self::with_runner(config, Arc::new(runner))
    }

    pub fn with_runner(
        config: Config,
        runner: Arc<dyn CommandRunner + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let redirect_location = HeaderValue::from_str(&config.redirect_location)
            .context("redirect_location is not a valid header value")?;

        Ok(Self {
            client: PooledClient::new(config.upstream_timeout()),
            config: Arc::new(config),
            redirect_location,
            runner,
            invocations: Arc::new(AtomicU64::new(0)),
        })
    }
}
