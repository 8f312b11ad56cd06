use crate::packages::{LanguagePair, PackageIndex, PackageStore};
use anyhow::{Context, Result};
use tracing::info;

/// Make sure every `(from_code, to_code)` pair in `pairs` is installed.
///
/// Pairs already installed are skipped. The index is refreshed once, and only
/// if something has to be downloaded. Returns the pairs that were installed.
pub async fn ensure_pairs<I, S>(
    index: &mut I,
    store: &S,
    pairs: &[(String, String)],
) -> Result<Vec<LanguagePair>>
where
    I: PackageIndex,
    S: PackageStore,
{
    let mut refreshed = false;
    let mut newly_installed = Vec::new();

    for (from_code, to_code) in pairs {
        let human = format!("{}->{}", from_code, to_code);
        let installed = store.installed()?;
        if installed
            .iter()
            .any(|p| p.codes() == (from_code.as_str(), to_code.as_str()))
        {
            info!("Package {} already installed", human);
            continue;
        }

        if !refreshed {
            index
                .refresh_index()
                .await
                .context("Failed to refresh package index")?;
            refreshed = true;
        }

        let descriptor = index
            .available_packages()
            .into_iter()
            .find(|d| d.pair.codes() == (from_code.as_str(), to_code.as_str()))
            .with_context(|| format!("Could not find {} package in package index", human))?;

        info!("Downloading package {}... this might take a moment", human);
        let artifact = index.download(&descriptor).await?;
        store
            .install_from_artifact(&artifact)
            .await
            .with_context(|| format!("Failed to install {}", human))?;
        info!("✓ Package {} installed", human);

        newly_installed.push(descriptor.pair);
    }

    Ok(newly_installed)
}
