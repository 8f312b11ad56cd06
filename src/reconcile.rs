//! Package reconciliation: bring the installed packages in line with a selection.
//!
//! A run refreshes the index, works out which selected packages are missing and
//! which installed ones were deselected, then uninstalls before installing.
//! Progress is reported through a caller-supplied callback before every
//! mutating call, and the run always ends with one [`SyncReport`].
//!
//! Failures never roll back: whatever was applied before a failing operation
//! stays applied, and the report describes the state that was reached.

use crate::catalog::{UiSnapshot, ViewPreferences};
use crate::error::SyncError;
use crate::packages::{LanguagePair, PackageDescriptor, PackageIndex, PackageStore};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

/// Progress of a running reconciliation, emitted before each operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// Operations finished so far
    pub completed: usize,
    /// Operations planned for this run
    pub total: usize,
    pub description: String,
}

impl Progress {
    /// Completed share in `[0, 1)`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// How a reconciliation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NoChanges,
    Updated,
    ManagementDisabled,
    IndexUnavailable,
    StoreUnavailable,
    OperationFailed,
}

/// Terminal event of a reconciliation
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// Human-readable status line
    pub message: String,
    /// Descriptions of the operations that were applied, in order
    pub applied: Vec<String>,
    /// State to redraw from, reflecting whatever was reached
    pub snapshot: UiSnapshot,
    #[serde(skip)]
    pub error: Option<SyncError>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn finished(
        status: SyncStatus,
        message: &str,
        applied: Vec<String>,
        snapshot: UiSnapshot,
    ) -> Self {
        Self {
            status,
            message: message.to_string(),
            applied,
            snapshot,
            error: None,
        }
    }

    fn failed(error: SyncError, applied: Vec<String>, snapshot: UiSnapshot) -> Self {
        let status = match &error {
            SyncError::ManagementDisabled => SyncStatus::ManagementDisabled,
            SyncError::IndexUnavailable(_) => SyncStatus::IndexUnavailable,
            SyncError::Store(_) => SyncStatus::StoreUnavailable,
            SyncError::OperationFailed { .. } => SyncStatus::OperationFailed,
        };
        Self {
            status,
            message: error.to_string(),
            applied,
            snapshot,
            error: Some(error),
        }
    }
}

/// Event stream item: progress updates followed by one report
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Progress(Progress),
    Finished(SyncReport),
}

/// The operations needed to reach a selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub to_uninstall: Vec<LanguagePair>,
    pub to_install: Vec<PackageDescriptor>,
}

impl SyncPlan {
    /// Compare `desired` display names against what is available and installed.
    ///
    /// Names select packages; a desired name the index does not list is ignored.
    /// An installed pair is kept only if its own display name is desired.
    pub fn compute(
        desired: &BTreeSet<String>,
        available: &[PackageDescriptor],
        installed: &[LanguagePair],
    ) -> Self {
        let by_name: BTreeMap<String, &PackageDescriptor> =
            available.iter().map(|d| (d.display_name(), d)).collect();
        let installed_names: BTreeSet<String> =
            installed.iter().map(LanguagePair::display_name).collect();

        let to_install = desired
            .iter()
            .filter(|name| !installed_names.contains(*name))
            .filter_map(|name| by_name.get(name).map(|d| (*d).clone()))
            .collect();

        let to_uninstall = installed
            .iter()
            .filter(|pair| !desired.contains(&pair.display_name()))
            .cloned()
            .collect();

        Self {
            to_uninstall,
            to_install,
        }
    }

    pub fn total(&self) -> usize {
        self.to_install.len() + self.to_uninstall.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Drives package changes through an index and a store.
///
/// `reconcile` takes `&mut self`, so a single reconciler never runs two
/// reconciliations at once; callers sharing one must serialize access.
#[derive(Debug)]
pub struct Reconciler<I, S> {
    index: I,
    store: S,
    preferences: ViewPreferences,
    management_enabled: bool,
}

impl<I, S> Reconciler<I, S>
where
    I: PackageIndex,
    S: PackageStore,
{
    pub fn new(index: I, store: S, preferences: ViewPreferences) -> Self {
        Self {
            index,
            store,
            preferences,
            management_enabled: true,
        }
    }

    /// Refuse every reconciliation when `enabled` is false (read-only mode)
    pub fn with_management_enabled(mut self, enabled: bool) -> Self {
        self.management_enabled = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn preferences(&self) -> &ViewPreferences {
        &self.preferences
    }

    /// Current view of packages and languages.
    ///
    /// The index is refreshed first; if that fails the view is built from the
    /// installed packages and the configured defaults only.
    pub async fn snapshot(&mut self) -> UiSnapshot {
        let available = match self.index.refresh_index().await {
            Ok(()) => self.index.available_packages(),
            Err(e) => {
                warn!("Package index unavailable, listing installed packages only: {:#}", e);
                Vec::new()
            }
        };
        self.build_snapshot(&available)
    }

    /// Reconcile installed packages with `desired` display names.
    ///
    /// `on_progress` runs before each install or uninstall. The returned report
    /// is the terminal event; a run with nothing to do emits no progress.
    pub async fn reconcile<F>(
        &mut self,
        desired: &BTreeSet<String>,
        mut on_progress: F,
    ) -> SyncReport
    where
        F: FnMut(Progress),
    {
        if !self.management_enabled {
            warn!("Package update requested while package management is disabled");
            let snapshot = self.build_snapshot(&[]);
            return SyncReport::failed(SyncError::ManagementDisabled, Vec::new(), snapshot);
        }

        info!("Reconciling packages against {} selected", desired.len());

        if let Err(e) = self.index.refresh_index().await {
            error!("Package index unavailable: {:#}", e);
            let snapshot = self.build_snapshot(&[]);
            return SyncReport::failed(SyncError::IndexUnavailable(e), Vec::new(), snapshot);
        }
        let available = self.index.available_packages();

        let installed = match self.store.installed() {
            Ok(installed) => installed,
            Err(e) => {
                error!("Could not read installed packages: {:#}", e);
                let snapshot = UiSnapshot::build(&available, &[], &self.preferences);
                return SyncReport::failed(SyncError::Store(e), Vec::new(), snapshot);
            }
        };

        let plan = SyncPlan::compute(desired, &available, &installed);
        if plan.is_empty() {
            info!("Installed packages already match the selection");
            let snapshot = UiSnapshot::build(&available, &installed, &self.preferences);
            return SyncReport::finished(SyncStatus::NoChanges, "No changes", Vec::new(), snapshot);
        }

        let total = plan.total();
        info!(
            "Applying {} operations ({} uninstall, {} install)",
            total,
            plan.to_uninstall.len(),
            plan.to_install.len()
        );

        let mut applied = Vec::with_capacity(total);
        let outcome = self.apply(&plan, &mut applied, &mut on_progress).await;

        let snapshot = self.build_snapshot(&available);
        match outcome {
            Ok(()) => {
                info!("✓ Language packages updated ({} operations)", applied.len());
                SyncReport::finished(
                    SyncStatus::Updated,
                    "Language packages updated",
                    applied,
                    snapshot,
                )
            }
            Err(e) => {
                error!(
                    "Package update aborted after {}/{} operations: {}",
                    applied.len(),
                    total,
                    e
                );
                SyncReport::failed(e, applied, snapshot)
            }
        }
    }

    /// Run `reconcile` and collect every event in order
    pub async fn reconcile_events(&mut self, desired: &BTreeSet<String>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        let report = self
            .reconcile(desired, |progress| events.push(SyncEvent::Progress(progress)))
            .await;
        events.push(SyncEvent::Finished(report));
        events
    }

    async fn apply<F>(
        &self,
        plan: &SyncPlan,
        applied: &mut Vec<String>,
        on_progress: &mut F,
    ) -> Result<(), SyncError>
    where
        F: FnMut(Progress),
    {
        let total = plan.total();

        // Uninstall first so a pair reinstalled under a renamed index entry never collides
        for pair in &plan.to_uninstall {
            let description = format!("Uninstalling {}", pair.display_name());
            on_progress(Progress {
                completed: applied.len(),
                total,
                description: description.clone(),
            });
            info!("[{}/{}] {}", applied.len() + 1, total, description);

            self.store
                .uninstall(pair)
                .await
                .map_err(|source| SyncError::OperationFailed {
                    operation: description.clone(),
                    source,
                })?;
            applied.push(description);
        }

        for descriptor in &plan.to_install {
            let description = format!("Installing {}", descriptor.display_name());
            on_progress(Progress {
                completed: applied.len(),
                total,
                description: description.clone(),
            });
            info!("[{}/{}] {}", applied.len() + 1, total, description);

            let artifact = self
                .index
                .download(descriptor)
                .await
                .map_err(|source| SyncError::OperationFailed {
                    operation: description.clone(),
                    source,
                })?;
            self.store
                .install_from_artifact(&artifact)
                .await
                .map_err(|source| SyncError::OperationFailed {
                    operation: description.clone(),
                    source,
                })?;
            applied.push(description);
        }

        Ok(())
    }

    /// Snapshot from a fresh read of the store; an unreadable store lists nothing installed
    fn build_snapshot(&self, available: &[PackageDescriptor]) -> UiSnapshot {
        let installed = self.store.installed().unwrap_or_else(|e| {
            warn!("Could not read installed packages: {:#}", e);
            Vec::new()
        });
        UiSnapshot::build(available, &installed, &self.preferences)
    }
}
