use super::{SchedulerInner, SyncScheduler};
use crate::models::{FolderDefinition, SyncResult};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::sync::{Arc, Weak};

/// The sync engine behind a folder.
///
/// Implementations run the actual transfer. `start_sync` must return
/// promptly and report through the [`SyncNotifier`]; `abort_sync` may arrive
/// at any time, also before the job reported that it started.
#[cfg_attr(test, mockall::automock)]
pub trait FolderBackend: Send + Sync {
    fn start_sync(&self, notifier: SyncNotifier) -> anyhow::Result<()>;

    fn abort_sync(&self);
}

/// Creates the backend for a folder definition (keyed by `definition.backend`).
pub trait FolderBackendFactory: Send + Sync {
    fn create(&self, definition: &FolderDefinition) -> anyhow::Result<Arc<dyn FolderBackend>>;
}

/// A configured sync folder as tracked by the scheduler.
#[derive(Clone)]
pub struct Folder {
    definition: FolderDefinition,
    enabled: bool,
    sync_result: SyncResult,
    backend: Arc<dyn FolderBackend>,
}

impl Folder {
    pub(crate) fn new(definition: FolderDefinition, backend: Arc<dyn FolderBackend>) -> Self {
        Self {
            definition,
            enabled: true,
            sync_result: SyncResult::undefined(),
            backend,
        }
    }

    pub fn alias(&self) -> &str {
        &self.definition.alias
    }

    pub fn definition(&self) -> &FolderDefinition {
        &self.definition
    }

    pub fn local_path(&self) -> &Utf8Path {
        &self.definition.local_path
    }

    pub fn remote_path(&self) -> &str {
        &self.definition.remote_path
    }

    pub fn backend_kind(&self) -> &str {
        &self.definition.backend
    }

    pub fn journal_path(&self) -> Utf8PathBuf {
        self.definition.journal_path()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Result of the most recent sync run, undefined if none completed.
    pub fn sync_result(&self) -> &SyncResult {
        &self.sync_result
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_sync_result(&mut self, result: SyncResult) {
        self.sync_result = result;
    }

    pub(crate) fn backend(&self) -> Arc<dyn FolderBackend> {
        self.backend.clone()
    }
}

impl fmt::Debug for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Folder")
            .field("definition", &self.definition)
            .field("enabled", &self.enabled)
            .field("sync_result", &self.sync_result)
            .finish_non_exhaustive()
    }
}

/// Handle a backend uses to report progress of one sync job.
///
/// Holds only a weak reference; reports after the scheduler is gone are
/// dropped.
#[derive(Clone)]
pub struct SyncNotifier {
    alias: String,
    scheduler: Weak<SchedulerInner>,
}

impl SyncNotifier {
    pub(crate) fn new(alias: String, scheduler: Weak<SchedulerInner>) -> Self {
        Self { alias, scheduler }
    }

    /// Notifier not attached to any scheduler.
    pub fn detached(alias: impl Into<String>) -> Self {
        Self::new(alias.into(), Weak::new())
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn started(&self) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.slot_folder_sync_started(&self.alias);
        }
    }

    pub fn finished(&self, result: SyncResult) {
        match self.scheduler() {
            Some(scheduler) => scheduler.slot_folder_sync_finished(&self.alias, result),
            None => tracing::debug!(
                "Scheduler gone, dropping result of {}: {}",
                self.alias,
                result.status()
            ),
        }
    }

    fn scheduler(&self) -> Option<SyncScheduler> {
        self.scheduler.upgrade().map(SyncScheduler::from_inner)
    }
}

impl fmt::Debug for SyncNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncNotifier")
            .field("alias", &self.alias)
            .field("attached", &(self.scheduler.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStatus;

    fn definition() -> FolderDefinition {
        FolderDefinition::new("owncloud", "docs", "/home/me/Docs", "/Docs", false)
    }

    #[test]
    fn test_new_folder_is_enabled_and_undefined() {
        let folder = Folder::new(definition(), Arc::new(MockFolderBackend::new()));
        assert!(folder.is_enabled());
        assert!(folder.sync_result().is_undefined());
        assert_eq!(folder.alias(), "docs");
        assert_eq!(folder.backend_kind(), "owncloud");
        assert_eq!(folder.remote_path(), "/Docs");
    }

    #[test]
    fn test_debug_omits_backend() {
        let folder = Folder::new(definition(), Arc::new(MockFolderBackend::new()));
        let text = format!("{:?}", folder);
        assert!(text.contains("docs"));
        assert!(!text.contains("Mock"));
    }

    #[test]
    fn test_detached_notifier_drops_reports() {
        let notifier = SyncNotifier::detached("docs");
        notifier.started();
        notifier.finished(SyncResult::new(SyncStatus::Success));
        assert_eq!(notifier.alias(), "docs");
    }

    #[test]
    fn test_backend_receives_notifier_for_alias() {
        let mut backend = MockFolderBackend::new();
        backend
            .expect_start_sync()
            .withf(|notifier| notifier.alias() == "docs")
            .times(1)
            .returning(|_| Ok(()));

        let folder = Folder::new(definition(), Arc::new(backend));
        folder
            .backend()
            .start_sync(SyncNotifier::detached("docs"))
            .unwrap();
    }
}
