//! Passwall switcher: keeps an eye on the Passwall service of an OpenWrt
//! router and flips it on request.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,russh=warn";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = config::Config::load()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        router = %config.ssh.host,
        port = config.ssh.port,
        every_secs = config.poll.interval_secs,
        "passwall-switcher starting"
    );

    // Two workers cover the poller task and the event loop.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("passwall-switcher")
        .enable_all()
        .build()?;
    let result = runtime.block_on(app::run(config));

    match &result {
        Ok(()) => tracing::info!("passwall-switcher exited"),
        Err(e) => tracing::error!(error = %e, "passwall-switcher failed"),
    }
    result
}
