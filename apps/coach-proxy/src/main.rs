use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use coach_core::{Core, GeminiUpstream};
use tracing::{info, warn};

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("coach-proxy failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.proxy_config();
    let credential = cli.credential();
    if credential.is_none() {
        warn!("API_KEY is not set; every proxy request will fail until it is configured");
    }
    info!(
        model = %config.model,
        base_url = %config.base_url,
        attach_system_prompt = config.default_attach_system_prompt,
        timeout_secs = config.timeout.as_secs(),
        proxy = %cli.proxy_host().unwrap_or_default(),
        "config loaded"
    );

    let upstream = GeminiUpstream::new(&config).context("failed to build upstream client")?;
    let core = Core::new(config, credential, Arc::new(upstream));
    let app = core.router();

    let bind = cli.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("coach_proxy=info,coach_core=info,tower_http=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
