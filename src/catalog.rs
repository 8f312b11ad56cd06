//! Language catalog and the selector views derived from it.

use crate::packages::{LanguagePair, PackageDescriptor};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Map every installed language's display name to its code.
///
/// Both ends of every installed pair contribute. When one display name is used
/// for two codes only one entry survives (the code that sorts last).
pub fn language_map(installed: &[LanguagePair]) -> BTreeMap<String, String> {
    let mut unique: BTreeSet<(&str, &str)> = BTreeSet::new();
    for pair in installed {
        unique.insert((pair.from_name.as_str(), pair.from_code.as_str()));
        unique.insert((pair.to_name.as_str(), pair.to_code.as_str()));
    }

    unique
        .into_iter()
        .map(|(name, code)| (name.to_string(), code.to_string()))
        .collect()
}

/// Installed language names, sorted for stable listing
pub fn installed_language_names(installed: &[LanguagePair]) -> Vec<String> {
    language_map(installed).into_keys().collect()
}

/// Preferences applied when building selector views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPreferences {
    /// Preferred default for the source language selector
    pub preferred_source: String,
    /// Preferred default for the target language selector
    pub preferred_target: String,
    /// `(from_code, to_code)` pairs always listed in the package view
    pub default_pairs: Vec<(String, String)>,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            preferred_source: "Englisch".to_string(),
            preferred_target: "Deutsch".to_string(),
            default_pairs: vec![
                ("en".to_string(), "de".to_string()),
                ("de".to_string(), "en".to_string()),
            ],
        }
    }
}

impl From<&crate::config::Config> for ViewPreferences {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            preferred_source: config.preferred_source.clone(),
            preferred_target: config.preferred_target.clone(),
            default_pairs: config.default_pairs.clone(),
        }
    }
}

/// A single-choice language dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageSelector {
    pub choices: Vec<String>,
    pub selected: Option<String>,
}

impl LanguageSelector {
    /// Select `preferred` if offered, else the first sorted choice, else nothing
    pub fn with_preference(mut choices: Vec<String>, preferred: &str) -> Self {
        choices.sort();
        let selected = if choices.iter().any(|c| c == preferred) {
            Some(preferred.to_string())
        } else {
            choices.first().cloned()
        };
        Self { choices, selected }
    }
}

/// A multi-choice package checklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSelection {
    /// Every known package name, sorted
    pub choices: Vec<String>,
    /// Names of installed packages, sorted
    pub selected: Vec<String>,
}

impl PackageSelection {
    pub fn from_statuses(statuses: &BTreeMap<String, bool>) -> Self {
        Self {
            choices: statuses.keys().cloned().collect(),
            selected: statuses
                .iter()
                .filter(|(_, installed)| **installed)
                .map(|(name, _)| name.clone())
                .collect(),
        }
    }
}

/// Install status of every known package, keyed by display name.
///
/// Status is decided by code, so an installed pair whose metadata spells its
/// names differently from the index still shows as installed. Installed pairs
/// missing from `available` and the configured default pairs are always listed.
pub fn package_statuses(
    available: &[PackageDescriptor],
    installed: &[LanguagePair],
    default_pairs: &[(String, String)],
) -> BTreeMap<String, bool> {
    let mut statuses: BTreeMap<String, bool> =
        PackageDescriptor::with_install_status(available, installed)
            .into_iter()
            .map(|d| (d.display_name(), d.installed))
            .collect();

    for pair in installed {
        if !available.iter().any(|d| d.pair.same_codes(pair)) {
            statuses.insert(pair.display_name(), true);
        }
    }

    let names = code_names(available, installed);
    for (from, to) in default_pairs {
        let known = available
            .iter()
            .map(|d| &d.pair)
            .chain(installed)
            .any(|p| p.codes() == (from.as_str(), to.as_str()));
        if known {
            continue;
        }

        let name_of = |code: &str| names.get(code).copied().unwrap_or(code).to_string();
        statuses.insert(format!("{} -> {}", name_of(from), name_of(to)), false);
    }

    statuses
}

/// Best-known display name for each code; installed names win over index names
fn code_names<'a>(
    available: &'a [PackageDescriptor],
    installed: &'a [LanguagePair],
) -> BTreeMap<&'a str, &'a str> {
    let mut names = BTreeMap::new();
    for pair in available.iter().map(|d| &d.pair).chain(installed) {
        names.insert(pair.from_code.as_str(), pair.from_name.as_str());
        names.insert(pair.to_code.as_str(), pair.to_name.as_str());
    }
    names
}

/// Everything a front end needs to redraw after a package change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiSnapshot {
    pub packages: PackageSelection,
    pub source: LanguageSelector,
    pub target: LanguageSelector,
}

impl UiSnapshot {
    pub fn build(
        available: &[PackageDescriptor],
        installed: &[LanguagePair],
        preferences: &ViewPreferences,
    ) -> Self {
        let statuses = package_statuses(available, installed, &preferences.default_pairs);
        let names = installed_language_names(installed);

        Self {
            packages: PackageSelection::from_statuses(&statuses),
            source: LanguageSelector::with_preference(names.clone(), &preferences.preferred_source),
            target: LanguageSelector::with_preference(names, &preferences.preferred_target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en_de() -> LanguagePair {
        LanguagePair::new("en", "Englisch", "de", "Deutsch")
    }

    fn de_en() -> LanguagePair {
        LanguagePair::new("de", "Deutsch", "en", "Englisch")
    }

    fn descriptor(pair: LanguagePair) -> PackageDescriptor {
        PackageDescriptor {
            pair,
            package_version: None,
            links: vec![],
            installed: false,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ==================== language_map Tests ====================

    #[test]
    fn test_language_map_collects_both_ends() {
        let map = language_map(&[
            en_de(),
            LanguagePair::new("fr", "Französisch", "en", "Englisch"),
        ]);

        assert_eq!(map.len(), 3);
        assert_eq!(map["Englisch"], "en");
        assert_eq!(map["Deutsch"], "de");
        assert_eq!(map["Französisch"], "fr");
    }

    #[test]
    fn test_language_map_name_collision_keeps_one_entry() {
        let map = language_map(&[
            LanguagePair::new("pt", "Portugiesisch", "en", "Englisch"),
            LanguagePair::new("pb", "Portugiesisch", "en", "Englisch"),
        ]);

        assert_eq!(map.len(), 2);
        assert_eq!(map["Portugiesisch"], "pt");
    }

    #[test]
    fn test_language_map_empty() {
        assert!(language_map(&[]).is_empty());
    }

    // ==================== installed_language_names Tests ====================

    #[test]
    fn test_installed_language_names_sorted() {
        assert_eq!(
            installed_language_names(&[en_de(), de_en()]),
            names(&["Deutsch", "Englisch"])
        );
    }

    #[test]
    fn test_installed_language_names_sorted_regardless_of_order() {
        let installed = vec![
            LanguagePair::new("fr", "Französisch", "en", "Englisch"),
            LanguagePair::new("de", "Deutsch", "fr", "Französisch"),
        ];
        assert_eq!(
            installed_language_names(&installed),
            names(&["Deutsch", "Englisch", "Französisch"])
        );
    }

    // ==================== LanguageSelector Tests ====================

    #[test]
    fn test_selector_prefers_fixed_names() {
        let installed = names(&["Französisch", "Englisch", "Deutsch"]);

        let source = LanguageSelector::with_preference(installed.clone(), "Englisch");
        let target = LanguageSelector::with_preference(installed, "Deutsch");

        assert_eq!(source.selected.as_deref(), Some("Englisch"));
        assert_eq!(target.selected.as_deref(), Some("Deutsch"));
        assert_eq!(source.choices, names(&["Deutsch", "Englisch", "Französisch"]));
    }

    #[test]
    fn test_selector_falls_back_to_first_sorted() {
        let selector =
            LanguageSelector::with_preference(names(&["Spanisch", "Französisch"]), "Englisch");
        assert_eq!(selector.selected.as_deref(), Some("Französisch"));
    }

    #[test]
    fn test_selector_empty() {
        let selector = LanguageSelector::with_preference(vec![], "Englisch");
        assert!(selector.choices.is_empty());
        assert!(selector.selected.is_none());
    }

    // ==================== package_statuses Tests ====================

    #[test]
    fn test_package_statuses_marks_installed_by_code() {
        let available = vec![
            descriptor(LanguagePair::new("en", "English", "de", "German")),
            descriptor(LanguagePair::new("en", "English", "fr", "French")),
        ];

        let statuses = package_statuses(&available, &[en_de()], &[]);

        assert_eq!(statuses.len(), 2);
        assert!(statuses["English -> German"]);
        assert!(!statuses["English -> French"]);
    }

    #[test]
    fn test_package_statuses_lists_installed_pairs_missing_from_index() {
        let statuses = package_statuses(&[], &[en_de()], &[]);
        assert!(statuses["Englisch -> Deutsch"]);
    }

    #[test]
    fn test_package_statuses_adds_missing_defaults() {
        let available = vec![descriptor(en_de())];
        let defaults = ViewPreferences::default().default_pairs;

        let statuses = package_statuses(&available, &[], &defaults);

        assert_eq!(statuses.len(), 2);
        assert!(!statuses["Englisch -> Deutsch"]);
        // Names resolved from the known pairs
        assert!(!statuses["Deutsch -> Englisch"]);
    }

    #[test]
    fn test_package_statuses_default_with_unknown_codes_uses_codes() {
        let statuses = package_statuses(&[], &[], &[("xx".to_string(), "yy".to_string())]);
        assert!(!statuses["xx -> yy"]);
    }

    // ==================== UiSnapshot Tests ====================

    #[test]
    fn test_snapshot_build() {
        let available = vec![descriptor(en_de()), descriptor(de_en())];
        let snapshot = UiSnapshot::build(&available, &[en_de()], &ViewPreferences::default());

        assert_eq!(
            snapshot.packages.choices,
            names(&["Deutsch -> Englisch", "Englisch -> Deutsch"])
        );
        assert_eq!(snapshot.packages.selected, names(&["Englisch -> Deutsch"]));
        assert_eq!(snapshot.source.selected.as_deref(), Some("Englisch"));
        assert_eq!(snapshot.target.selected.as_deref(), Some("Deutsch"));
    }

    #[test]
    fn test_snapshot_nothing_installed() {
        let snapshot = UiSnapshot::build(&[], &[], &ViewPreferences::default());

        assert!(snapshot.packages.selected.is_empty());
        assert!(snapshot.source.selected.is_none());
        assert!(snapshot.target.selected.is_none());
        assert_eq!(snapshot.packages.choices, names(&["de -> en", "en -> de"]));
    }
}
