mod authz;
mod config;
mod credentials;
mod errors;
mod guard;
mod headers;
mod logging;
mod routes;
mod security;
mod server;
mod session;
mod store;

use crate::{config::Config, guard::PathGuard, server::AppState, store::MemoryStore};
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut config_path = PathBuf::from("warden.toml");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = args.next().map(PathBuf::from).context("--config requires a path")?;
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    cfg.validate().context("validating config")?;

    let guard = PathGuard::new(&cfg.files.base_dir, cfg.files.symlink_check)?;
    let store = MemoryStore::from_seed(&cfg.seed).context("hashing seed credentials")?;

    let addr = format!("{}:{}", cfg.server.bind_addr, cfg.server.port);
    info!(
        addr = %addr,
        base_dir = %guard.base().display(),
        symlink_check = cfg.files.symlink_check,
        users = cfg.seed.users.len(),
        orders = cfg.seed.orders.len(),
        "warden ready"
    );
    println!("warden ready addr={addr}");

    server::serve(AppState::new(cfg, guard, store)).await
}
