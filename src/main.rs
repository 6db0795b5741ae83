//! Binary entry point for the allocation service.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use progalloc::api;
use progalloc::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,progalloc=debug")),
        )
        .init();

    let config = Config::from_env()?;
    api::serve(config).await
}
