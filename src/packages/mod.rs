//! Translation package model and the collaborators that fetch and store packages.
//!
//! - `shape`: normalizes the two package record layouts into `LanguagePair`
//! - `index`: remote package index client (HTTP)
//! - `store`: installed packages kept in a local directory
//!
//! The reconciler and the translation resolver only see `LanguagePair`,
//! `PackageDescriptor` and the two traits below.

mod index;
mod shape;
mod store;

pub use index::HttpPackageIndex;
pub use shape::{parse_index, PackageRecord};
pub use store::DirectoryPackageStore;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;

/// A directed translation capability.
///
/// Identity is the `(from_code, to_code)` pair. Names are display aliases and
/// may be spelled differently by the index and by installed metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguagePair {
    pub from_code: String,
    pub from_name: String,
    pub to_code: String,
    pub to_name: String,
}

impl LanguagePair {
    pub fn new(
        from_code: impl Into<String>,
        from_name: impl Into<String>,
        to_code: impl Into<String>,
        to_name: impl Into<String>,
    ) -> Self {
        Self {
            from_code: from_code.into(),
            from_name: from_name.into(),
            to_code: to_code.into(),
            to_name: to_name.into(),
        }
    }

    /// Human-readable name used by package selectors, e.g. `Englisch -> Deutsch`
    pub fn display_name(&self) -> String {
        format!("{} -> {}", self.from_name, self.to_name)
    }

    pub fn codes(&self) -> (&str, &str) {
        (&self.from_code, &self.to_code)
    }

    /// True when both pairs describe the same directed capability
    pub fn same_codes(&self, other: &LanguagePair) -> bool {
        self.codes() == other.codes()
    }
}

/// An installable package as listed by the remote index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageDescriptor {
    pub pair: LanguagePair,
    pub package_version: Option<String>,
    pub links: Vec<String>,
    pub installed: bool,
}

impl PackageDescriptor {
    pub fn display_name(&self) -> String {
        self.pair.display_name()
    }

    /// Copy of `descriptors` with `installed` set by code comparison
    pub fn with_install_status(
        descriptors: &[PackageDescriptor],
        installed: &[LanguagePair],
    ) -> Vec<PackageDescriptor> {
        descriptors
            .iter()
            .map(|d| PackageDescriptor {
                installed: installed.iter().any(|p| p.same_codes(&d.pair)),
                ..d.clone()
            })
            .collect()
    }
}

/// A downloaded package artifact waiting to be installed
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactHandle {
    pub path: PathBuf,
    pub pair: LanguagePair,
    pub package_version: Option<String>,
}

/// Remote catalog of installable packages
pub trait PackageIndex {
    /// Fetch the index again; callers decide how to degrade on failure
    fn refresh_index(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Packages from the last successful refresh
    fn available_packages(&self) -> Vec<PackageDescriptor>;

    /// Download the artifact of `descriptor` to local storage
    fn download(
        &self,
        descriptor: &PackageDescriptor,
    ) -> impl Future<Output = Result<ArtifactHandle>> + Send;
}

/// Durable record of installed packages.
///
/// Listing is cheap and synchronous; installing and uninstalling move model
/// files around and are async so they stay off the runtime's worker threads.
pub trait PackageStore {
    fn installed(&self) -> Result<Vec<LanguagePair>>;

    fn install_from_artifact(
        &self,
        artifact: &ArtifactHandle,
    ) -> impl Future<Output = Result<()>> + Send;

    fn uninstall(&self, pair: &LanguagePair) -> impl Future<Output = Result<()>> + Send;
}
