use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use filter_proxy::config::{Cli, Config};
use filter_proxy::policy::PolicySet;
use filter_proxy::proxy::{Gateway, ProxyHandler, RedirectRewriter};
use filter_proxy::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::from_cli(Cli::parse()).context("invalid configuration")?;

    let policy = PolicySet::load(&cfg.rules_path).context("Error loading allowlist")?;

    tracing::info!("Public access URL: http://{}", cfg.public_addr);
    tracing::info!("Forwarding allowed requests to {}", cfg.target);
    tracing::info!(
        "Loaded {} rules from {}",
        policy.len(),
        cfg.rules_path.display()
    );

    let gateway = Arc::new(Gateway::new(
        policy,
        ProxyHandler::new(cfg.target.clone(), cfg.connect_timeout, cfg.request_timeout),
        RedirectRewriter::new(cfg.target.clone(), cfg.public_addr.clone()),
    ));

    tokio::select! {
        res = server::listener::run(&cfg.listen_addr, gateway) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
