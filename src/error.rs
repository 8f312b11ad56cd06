//! Error types surfaced at the boundary of the package manager and translator.
//!
//! Collaborators (index client, package store, translation engine) report
//! failures as `anyhow::Error`; these enums are what callers match on to turn
//! a failure into a user-facing message.

use thiserror::Error;

/// Failures of a translation request
#[derive(Error, Debug)]
pub enum TranslateError {
    /// The language name is not known to the installed catalog (stale selection)
    #[error("Language '{0}' not found among installed languages")]
    NotFound(String),

    /// Both languages are known but no package covers the directed pair
    #[error(
        "No language package installed for {from} -> {to}. Install it under \"Manage Languages\"."
    )]
    NoPackageInstalled { from: String, to: String },

    /// Reading the installed packages failed
    #[error("Could not read installed packages: {0:#}")]
    Store(#[source] anyhow::Error),

    /// The external translator failed
    #[error("Translation failed: {0:#}")]
    Engine(#[source] anyhow::Error),
}

/// Failures that end a package reconciliation run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Package management is switched off
    #[error("Package management is disabled")]
    ManagementDisabled,

    /// The remote package index could not be fetched; nothing was changed
    #[error("Package index unavailable: {0:#}")]
    IndexUnavailable(#[source] anyhow::Error),

    /// Reading the installed packages failed before any change was made
    #[error("Could not read installed packages: {0:#}")]
    Store(#[source] anyhow::Error),

    /// A download, install or uninstall failed; the rest of the batch was skipped
    #[error("{operation} failed: {source:#}")]
    OperationFailed {
        operation: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_package_installed_names_display_pair() {
        let err = TranslateError::NoPackageInstalled {
            from: "Englisch".to_string(),
            to: "Deutsch".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Englisch -> Deutsch"));
        assert!(message.contains("Manage Languages"));
    }

    #[test]
    fn test_not_found_names_language() {
        let err = TranslateError::NotFound("Klingon".to_string());
        assert!(err.to_string().contains("Klingon"));
    }

    #[test]
    fn test_operation_failed_includes_context_chain() {
        let source = anyhow::anyhow!("connection reset").context("download interrupted");
        let err = SyncError::OperationFailed {
            operation: "Installing Englisch -> Deutsch".to_string(),
            source,
        };
        let message = err.to_string();
        assert!(message.starts_with("Installing Englisch -> Deutsch failed"));
        assert!(message.contains("download interrupted"));
        assert!(message.contains("connection reset"));
    }
}
