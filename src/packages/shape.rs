//! Normalization of package records.
//!
//! Package records come in two layouts: the current flat one
//! (`from_code`, `from_name`, ...) and an older one with nested
//! `from_lang`/`to_lang` objects. Both are mapped to `LanguagePair` here so
//! nothing downstream has to care which one it was.

use super::{LanguagePair, PackageDescriptor};
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct LanguageRef {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Endpoints {
    Nested {
        from_lang: LanguageRef,
        to_lang: LanguageRef,
    },
    Flat {
        from_code: String,
        from_name: String,
        to_code: String,
        to_name: String,
    },
}

/// A package record from the remote index or an installed `metadata.json`
#[derive(Debug, Deserialize)]
pub struct PackageRecord {
    #[serde(flatten)]
    endpoints: Endpoints,
    #[serde(default)]
    package_version: Option<String>,
    #[serde(default)]
    package_type: Option<String>,
    #[serde(default)]
    links: Vec<String>,
}

impl PackageRecord {
    pub fn pair(&self) -> LanguagePair {
        match &self.endpoints {
            Endpoints::Nested { from_lang, to_lang } => LanguagePair::new(
                &from_lang.code,
                &from_lang.name,
                &to_lang.code,
                &to_lang.name,
            ),
            Endpoints::Flat {
                from_code,
                from_name,
                to_code,
                to_name,
            } => LanguagePair::new(from_code, from_name, to_code, to_name),
        }
    }

    pub fn package_version(&self) -> Option<&str> {
        self.package_version.as_deref()
    }

    /// Only translation packages are relevant; records without a type are assumed to be one
    fn is_translation(&self) -> bool {
        self.package_type
            .as_deref()
            .map(|t| t == "translate")
            .unwrap_or(true)
    }

    fn into_descriptor(self) -> PackageDescriptor {
        PackageDescriptor {
            pair: self.pair(),
            package_version: self.package_version,
            links: self.links,
            installed: false,
        }
    }
}

/// Parse a package index document (a JSON array of package records).
///
/// Individual malformed entries are skipped with a warning; a document that is
/// not a JSON array is an error.
pub fn parse_index(body: &str) -> Result<Vec<PackageDescriptor>> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(body).context("Package index is not a JSON array")?;

    let total = entries.len();
    let mut descriptors = Vec::with_capacity(total);

    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<PackageRecord>(entry) {
            Ok(record) if record.is_translation() => descriptors.push(record.into_descriptor()),
            Ok(record) => debug!(
                "Skipping non-translation package {:?} at position {}",
                record.package_type, position
            ),
            Err(e) => warn!("Skipping malformed index entry at position {}: {}", position, e),
        }
    }

    debug!("Parsed {} of {} index entries", descriptors.len(), total);
    Ok(descriptors)
}
