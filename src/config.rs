use anyhow::{Context, Result};
use std::path::PathBuf;

/// Default Argos package index
pub const DEFAULT_PACKAGE_INDEX_URL: &str =
    "https://raw.githubusercontent.com/argosopentech/argospm-index/main/index.json";

#[derive(Debug, Clone)]
pub struct Config {
    // Package index
    pub package_index_url: String,
    pub http_timeout_secs: u64,

    // Local storage
    pub data_dir: PathBuf,

    // External translation engine
    pub translate_command: String,

    // Package management (false = read-only mode)
    pub enable_package_management: bool,

    // Language selectors
    pub preferred_source: String,
    pub preferred_target: String,

    // Pairs installed by the setup binary and always listed in the package view
    pub default_pairs: Vec<(String, String)>,

    // Web server
    pub port: u16,
    pub allow_remote: bool,
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let default_pairs = match std::env::var("ARGOS_DEFAULT_PAIRS") {
            Ok(raw) => parse_pairs(&raw).context("ARGOS_DEFAULT_PAIRS is malformed")?,
            Err(_) => vec![
                ("en".to_string(), "de".to_string()),
                ("de".to_string(), "en".to_string()),
            ],
        };

        Ok(Self {
            // Package index
            package_index_url: std::env::var("ARGOS_PACKAGE_INDEX_URL")
                .unwrap_or_else(|_| DEFAULT_PACKAGE_INDEX_URL.to_string()),
            http_timeout_secs: std::env::var("ARGOS_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            // Local storage
            data_dir: std::env::var("ARGOS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),

            // External translation engine
            translate_command: std::env::var("ARGOS_TRANSLATE_COMMAND")
                .unwrap_or_else(|_| "argos-translate".to_string()),

            enable_package_management: std::env::var("ARGOS_ENABLE_PACKAGES")
                .ok()
                .map(|v| parse_bool(&v))
                .unwrap_or(true),

            // Language selectors
            preferred_source: std::env::var("ARGOS_PREFERRED_SOURCE")
                .unwrap_or_else(|_| "Englisch".to_string()),
            preferred_target: std::env::var("ARGOS_PREFERRED_TARGET")
                .unwrap_or_else(|_| "Deutsch".to_string()),

            default_pairs,

            // Web server
            port: std::env::var("ARGOS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7866),
            allow_remote: std::env::var("ARGOS_ALLOW_REMOTE")
                .ok()
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            api_key: std::env::var("ARGOS_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        })
    }

    /// Directory holding one subdirectory per installed package
    pub fn packages_dir(&self) -> PathBuf {
        self.data_dir.join("packages")
    }

    /// Directory downloaded artifacts are written to before installation
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    /// Address the web server binds to: loopback unless remote access is allowed
    pub fn bind_address(&self) -> String {
        let host = if self.allow_remote {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };
        format!("{}:{}", host, self.port)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a `from:to` comma-separated list such as `en:de,de:en`
fn parse_pairs(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (from, to) = entry
                .split_once(':')
                .with_context(|| format!("Invalid pair '{}'. Expected FROM:TO", entry))?;
            let (from, to) = (from.trim(), to.trim());
            if from.is_empty() || to.is_empty() {
                anyhow::bail!("Invalid pair '{}'. Expected FROM:TO", entry);
            }
            Ok((from.to_string(), to.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "ARGOS_PACKAGE_INDEX_URL",
        "ARGOS_HTTP_TIMEOUT_SECS",
        "ARGOS_DATA_DIR",
        "ARGOS_TRANSLATE_COMMAND",
        "ARGOS_ENABLE_PACKAGES",
        "ARGOS_PREFERRED_SOURCE",
        "ARGOS_PREFERRED_TARGET",
        "ARGOS_DEFAULT_PAIRS",
        "ARGOS_PORT",
        "ARGOS_ALLOW_REMOTE",
        "ARGOS_API_KEY",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    // ==================== from_env Tests ====================

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();

        let config = Config::from_env().expect("Should load defaults");

        assert_eq!(config.package_index_url, DEFAULT_PACKAGE_INDEX_URL);
        assert_eq!(config.http_timeout_secs, 60);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.translate_command, "argos-translate");
        assert!(config.enable_package_management);
        assert_eq!(config.preferred_source, "Englisch");
        assert_eq!(config.preferred_target, "Deutsch");
        assert_eq!(
            config.default_pairs,
            vec![
                ("en".to_string(), "de".to_string()),
                ("de".to_string(), "en".to_string())
            ]
        );
        assert_eq!(config.port, 7866);
        assert!(!config.allow_remote);
        assert!(config.api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("ARGOS_PACKAGE_INDEX_URL", "http://localhost:9000/index.json");
        std::env::set_var("ARGOS_DATA_DIR", "/tmp/argos");
        std::env::set_var("ARGOS_ENABLE_PACKAGES", "0");
        std::env::set_var("ARGOS_DEFAULT_PAIRS", "en:fr, fr:en");
        std::env::set_var("ARGOS_PORT", "8080");
        std::env::set_var("ARGOS_ALLOW_REMOTE", "true");
        std::env::set_var("ARGOS_API_KEY", "secret");

        let config = Config::from_env().expect("Should load overrides");
        clear_env();

        assert_eq!(config.package_index_url, "http://localhost:9000/index.json");
        assert_eq!(config.packages_dir(), PathBuf::from("/tmp/argos/packages"));
        assert_eq!(config.downloads_dir(), PathBuf::from("/tmp/argos/downloads"));
        assert!(!config.enable_package_management);
        assert_eq!(
            config.default_pairs,
            vec![
                ("en".to_string(), "fr".to_string()),
                ("fr".to_string(), "en".to_string())
            ]
        );
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port_falls_back() {
        clear_env();
        std::env::set_var("ARGOS_PORT", "not-a-port");

        let config = Config::from_env().expect("Should load");
        clear_env();

        assert_eq!(config.port, 7866);
        assert_eq!(config.bind_address(), "127.0.0.1:7866");
    }

    #[test]
    #[serial]
    fn test_from_env_malformed_pairs_is_error() {
        clear_env();
        std::env::set_var("ARGOS_DEFAULT_PAIRS", "en-de");

        let result = Config::from_env();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_empty_api_key_is_none() {
        clear_env();
        std::env::set_var("ARGOS_API_KEY", "");

        let config = Config::from_env().expect("Should load");
        clear_env();

        assert!(config.api_key.is_none());
    }

    // ==================== Helper Tests ====================

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" yes "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_parse_pairs_rejects_missing_side() {
        assert!(parse_pairs("en:").is_err());
        assert!(parse_pairs(":de").is_err());
        assert!(parse_pairs("").expect("Empty is fine").is_empty());
    }
}
