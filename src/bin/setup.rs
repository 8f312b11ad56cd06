//! Setup binary - installs the configured default language pairs
//!
//! Usage:
//!   cargo run --bin setup
//!
//! Optional environment variables:
//! - ARGOS_DEFAULT_PAIRS (defaults to en:de,de:en)
//! - ARGOS_DATA_DIR (defaults to data)
//! - ARGOS_PACKAGE_INDEX_URL (defaults to the public Argos index)

use anyhow::Result;
use offline_translator::{
    bootstrap::ensure_pairs,
    config::Config,
    packages::{DirectoryPackageStore, HttpPackageIndex},
};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("offline_translator=info".parse()?)
                .add_directive("setup=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    if !config.enable_package_management {
        anyhow::bail!("Package management is disabled (ARGOS_ENABLE_PACKAGES=false)");
    }

    let mut index = HttpPackageIndex::with_timeout(
        &config.package_index_url,
        config.downloads_dir(),
        Duration::from_secs(config.http_timeout_secs),
    )?;
    let store = DirectoryPackageStore::new(config.packages_dir());

    info!(
        "Ensuring {} default pairs in {}",
        config.default_pairs.len(),
        store.root().display()
    );
    let installed = ensure_pairs(&mut index, &store, &config.default_pairs).await?;

    if installed.is_empty() {
        info!("All default pairs already installed");
    } else {
        info!("Installed {} packages", installed.len());
    }
    Ok(())
}
