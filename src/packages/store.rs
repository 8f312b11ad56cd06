use super::index::sanitize;
use super::{ArtifactHandle, LanguagePair, PackageRecord, PackageStore};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const METADATA_FILE: &str = "metadata.json";
const MODEL_FILE: &str = "package.argosmodel";

/// Installed packages, one subdirectory per pair under `root`.
///
/// Each subdirectory holds a `metadata.json` describing the pair and the
/// package artifact itself. The directory is the only record; nothing is
/// cached in memory.
#[derive(Debug, Clone)]
pub struct DirectoryPackageStore {
    root: PathBuf,
}

#[derive(Debug, Serialize)]
struct InstalledMetadata<'a> {
    package_type: &'static str,
    from_code: &'a str,
    from_name: &'a str,
    to_code: &'a str,
    to_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    package_version: Option<&'a str>,
    installed_at: String,
}

impl DirectoryPackageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn package_dir(&self, pair: &LanguagePair) -> PathBuf {
        let (from, to) = pair.codes();
        self.root
            .join(format!("translate-{}_{}", sanitize(from), sanitize(to)))
    }

    /// Every readable package directory with the pair it holds
    fn entries(&self) -> Result<Vec<(PathBuf, LanguagePair)>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let dir = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {}", self.root.display()))?;

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.with_context(|| format!("Failed to read {}", self.root.display()))?;
            let path = entry.path();
            let metadata_path = path.join(METADATA_FILE);
            if !metadata_path.is_file() {
                continue;
            }

            match read_metadata(&metadata_path) {
                Ok(pair) => entries.push((path, pair)),
                Err(e) => warn!("Ignoring package at {}: {:#}", path.display(), e),
            }
        }

        entries.sort_by(|a, b| a.1.codes().cmp(&b.1.codes()));
        Ok(entries)
    }
}

fn read_metadata(path: &Path) -> Result<LanguagePair> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record: PackageRecord = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(record.pair())
}

impl DirectoryPackageStore {
    fn install_blocking(&self, artifact: &ArtifactHandle) -> Result<()> {
        let pair = &artifact.pair;
        let dir = self.package_dir(pair);

        // Distinct codes can sanitize to the same directory name
        if let Ok(occupant) = read_metadata(&dir.join(METADATA_FILE)) {
            if !occupant.same_codes(pair) {
                anyhow::bail!(
                    "Cannot install {}: {} already holds {}",
                    pair.display_name(),
                    dir.display(),
                    occupant.display_name()
                );
            }
        }

        // A reinstall under a new index entry replaces the old directory
        for (path, existing) in self.entries()? {
            if existing.same_codes(pair) {
                debug!("Replacing existing package at {}", path.display());
                fs::remove_dir_all(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }

        if dir.exists() {
            debug!("Clearing unreadable package directory {}", dir.display());
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        fs::copy(&artifact.path, dir.join(MODEL_FILE)).with_context(|| {
            format!(
                "Failed to copy {} into {}",
                artifact.path.display(),
                dir.display()
            )
        })?;

        let metadata = InstalledMetadata {
            package_type: "translate",
            from_code: &pair.from_code,
            from_name: &pair.from_name,
            to_code: &pair.to_code,
            to_name: &pair.to_name,
            package_version: artifact.package_version.as_deref(),
            installed_at: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&metadata)?;
        fs::write(dir.join(METADATA_FILE), json)
            .with_context(|| format!("Failed to write metadata in {}", dir.display()))?;

        if let Err(e) = fs::remove_file(&artifact.path) {
            debug!(
                "Could not remove downloaded artifact {}: {}",
                artifact.path.display(),
                e
            );
        }

        info!("Installed {} into {}", pair.display_name(), dir.display());
        Ok(())
    }

    fn uninstall_blocking(&self, pair: &LanguagePair) -> Result<()> {
        let matching: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|(_, existing)| existing.same_codes(pair))
            .collect();

        if matching.is_empty() {
            anyhow::bail!("Package {} is not installed", pair.display_name());
        }

        for (path, _) in matching {
            fs::remove_dir_all(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }

        info!("Uninstalled {}", pair.display_name());
        Ok(())
    }
}

impl PackageStore for DirectoryPackageStore {
    fn installed(&self) -> Result<Vec<LanguagePair>> {
        Ok(self.entries()?.into_iter().map(|(_, pair)| pair).collect())
    }

    async fn install_from_artifact(&self, artifact: &ArtifactHandle) -> Result<()> {
        let store = self.clone();
        let artifact = artifact.clone();
        tokio::task::spawn_blocking(move || store.install_blocking(&artifact))
            .await
            .context("Package install task failed")?
    }

    async fn uninstall(&self, pair: &LanguagePair) -> Result<()> {
        let store = self.clone();
        let pair = pair.clone();
        tokio::task::spawn_blocking(move || store.uninstall_blocking(&pair))
            .await
            .context("Package uninstall task failed")?
    }
}
