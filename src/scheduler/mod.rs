// Sync scheduler module
//
// Owns the configured folders and runs their sync jobs one at a time, in
// request order, emitting SchedulerEvents for the UI layer.

pub mod folder;
pub mod watcher;

pub use folder::{Folder, FolderBackend, FolderBackendFactory, SyncNotifier};
pub use watcher::ConfigFolderWatcher;

use crate::config::{ConfigManager, ConnectionStore};
use crate::metrics::Metrics;
use crate::models::{FolderDefinition, SyncResult, SyncStatus};
use crate::services::{ProtocolClient, journal};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

/// Change events emitted by the scheduler
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerEvent {
    /// A folder's sync status changed (prepare, running, finished, aborted)
    FolderSyncStateChange { alias: String, status: SyncStatus },

    /// Global sync switch was flipped
    SyncEnabledChanged { enabled: bool },

    /// Folders were (re)loaded from configuration
    FoldersLoaded { count: usize },

    FolderRemoved { alias: String },
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("A folder with alias '{0}' already exists")]
    AliasExists(String),

    #[error("Folder alias must not be empty")]
    EmptyAlias,

    #[error("Unable to create sync backend for '{alias}': {source}")]
    Backend {
        alias: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

struct SchedulerState {
    /// Folders by alias, in load order
    folders: IndexMap<String, Folder>,

    /// Aliases waiting for a sync, oldest first, no duplicates
    queue: VecDeque<String>,

    /// Alias of the folder whose job is running
    current: Option<String>,

    sync_enabled: bool,

    /// A scheduling loop is active; nested calls leave the work to it
    scheduling: bool,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            folders: IndexMap::new(),
            queue: VecDeque::new(),
            current: None,
            sync_enabled: true,
            scheduling: false,
        }
    }
}

pub(crate) struct SchedulerInner {
    config: ConfigManager,
    backends: Arc<dyn FolderBackendFactory>,
    client: Mutex<Option<ProtocolClient>>,
    state: Mutex<SchedulerState>,
    events_tx: broadcast::Sender<SchedulerEvent>,
    metrics: Metrics,
}

/// Folder sync scheduler
///
/// Central component that:
/// - Loads folder definitions through [`ConfigManager`] and creates a
///   [`FolderBackend`] for each via the [`FolderBackendFactory`]
/// - Keeps a FIFO queue of folders waiting to sync and runs at most one
///   job at a time
/// - Records each folder's last [`SyncResult`]
/// - Emits [`SchedulerEvent`]s via a tokio broadcast channel
///
/// Backends report progress through the [`SyncNotifier`] they receive on
/// start. Reports from a folder that is not the running one are ignored.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    /// Create a scheduler with no folders loaded
    ///
    /// # Returns
    /// A new SyncScheduler with a broadcast channel buffer of 100 events
    pub fn new(config: ConfigManager, backends: Arc<dyn FolderBackendFactory>) -> Self {
        let (events_tx, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                backends,
                client: Mutex::new(None),
                state: Mutex::new(SchedulerState::default()),
                events_tx,
                metrics: Metrics::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SchedulerInner>) -> Self {
        Self { inner }
    }

    /// Attach the protocol client that receives proxy changes
    pub fn set_protocol_client(&self, client: ProtocolClient) {
        *self
            .inner
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    /// Subscribe to scheduler events
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn config(&self) -> &ConfigManager {
        &self.inner.config
    }

    /// Unload everything, then load all stored folder definitions and start
    /// scheduling.
    ///
    /// # Returns
    /// Number of folders loaded
    pub fn setup_folders(&self) -> anyhow::Result<usize> {
        self.unload_all_folders();

        let definitions = self.inner.config.load_folder_definitions()?;
        let mut count = 0;
        for definition in definitions {
            let alias = definition.alias.clone();
            match self.insert_folder(definition) {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!("Skipping folder {}: {}", alias, e),
            }
        }

        tracing::info!("Loaded {} folders", count);
        self.emit(SchedulerEvent::FoldersLoaded { count });
        self.slot_schedule_folder_sync();
        Ok(count)
    }

    /// Re-read all definitions. Same as [`setup_folders`](Self::setup_folders).
    pub fn reparse_configuration(&self) -> anyhow::Result<usize> {
        self.setup_folders()
    }

    /// Load a single stored definition and add it to the set.
    ///
    /// # Returns
    /// `false` if no definition is stored under `alias`
    pub fn setup_folder_from_config(&self, alias: &str) -> Result<bool, SchedulerError> {
        let Some(definition) = self.inner.config.load_folder_definition(alias)? else {
            tracing::debug!("No stored definition for {}", alias);
            return Ok(false);
        };
        self.insert_folder(definition)?;
        Ok(true)
    }

    /// Persist a new folder definition and add the folder.
    ///
    /// The folder is not scheduled; call
    /// [`slot_schedule_all_folders`](Self::slot_schedule_all_folders) or
    /// [`slot_schedule_sync`](Self::slot_schedule_sync) for that.
    pub fn add_folder_definition(
        &self,
        backend: &str,
        alias: &str,
        local_path: &Utf8Path,
        remote_path: &str,
        only_this_lan: bool,
    ) -> Result<(), SchedulerError> {
        if alias.is_empty() {
            return Err(SchedulerError::EmptyAlias);
        }
        if self.state().folders.contains_key(alias)
            || self.inner.config.folder_definition_exists(alias)
        {
            return Err(SchedulerError::AliasExists(alias.to_string()));
        }

        let definition =
            FolderDefinition::new(backend, alias, local_path, remote_path, only_this_lan);
        let folder_backend = self.create_backend(&definition)?;
        self.inner.config.save_folder_definition(&definition)?;

        let mut state = self.state();
        if state.folders.contains_key(alias) {
            return Err(SchedulerError::AliasExists(alias.to_string()));
        }
        state
            .folders
            .insert(alias.to_string(), Folder::new(definition, folder_backend));
        tracing::info!("Added folder {} ({} -> {})", alias, local_path, remote_path);
        Ok(())
    }

    /// Snapshot of a folder
    pub fn folder(&self, alias: &str) -> Option<Folder> {
        self.state().folders.get(alias).cloned()
    }

    /// Aliases of all loaded folders, in load order
    pub fn aliases(&self) -> Vec<String> {
        self.state().folders.keys().cloned().collect()
    }

    /// Last result of a folder, undefined for unknown aliases
    pub fn sync_result(&self, alias: &str) -> SyncResult {
        self.state()
            .folders
            .get(alias)
            .map(|folder| folder.sync_result().clone())
            .unwrap_or_default()
    }

    /// Alias of the folder whose job is running
    pub fn current_sync_folder(&self) -> Option<String> {
        self.state().current.clone()
    }

    /// Aliases waiting for a sync, next first
    pub fn pending_queue(&self) -> Vec<String> {
        self.state().queue.iter().cloned().collect()
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.state().sync_enabled
    }

    /// Unload all folders and delete all stored definitions.
    ///
    /// Local files and journals are left alone.
    pub fn remove_all_folder_definitions(&self) -> anyhow::Result<usize> {
        self.unload_all_folders();
        let removed = self.inner.config.remove_all_folder_definitions()?;
        tracing::info!("Removed {} folder definitions", removed);
        Ok(removed)
    }

    /// Delete the journal of every loaded folder.
    ///
    /// # Returns
    /// `true` if all journals are gone
    pub fn wipe_all_journals(&self) -> bool {
        let paths: Vec<Utf8PathBuf> = self
            .state()
            .folders
            .values()
            .map(|folder| folder.local_path().to_path_buf())
            .collect();

        paths
            .iter()
            .fold(true, |all_gone, path| journal::ensure_journal_gone(path) && all_gone)
    }

    pub fn ensure_journal_gone(local_path: &Utf8Path) -> bool {
        journal::ensure_journal_gone(local_path)
    }

    pub fn start_from_scratch(local_path: &Utf8Path) -> bool {
        journal::start_from_scratch(local_path)
    }

    /// Forward the stored proxy settings to the attached protocol client.
    pub fn set_proxy(&self) {
        let client = self
            .inner
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(client) = client else {
            tracing::debug!("No protocol client attached, proxy change not forwarded");
            return;
        };

        let proxy = self.inner.config.proxy(&client.config_handle(None));
        if let Err(e) = client.set_proxy(proxy) {
            tracing::warn!("Unable to apply proxy settings: {}", e);
        }
    }

    /// Remove a folder: abort its job, drop it from the queue, delete its
    /// stored definition and its journal.
    ///
    /// # Returns
    /// `false` if the alias is unknown
    pub fn slot_remove_folder(&self, alias: &str) -> anyhow::Result<bool> {
        if !self.state().folders.contains_key(alias) {
            tracing::warn!("Cannot remove unknown folder {}", alias);
            return Ok(false);
        }

        self.terminate_sync_process(Some(alias));
        self.inner.config.remove_folder_definition(alias)?;

        let removed = {
            let mut state = self.state();
            state.queue.retain(|queued| queued != alias);
            state.folders.shift_remove(alias)
        };
        let Some(folder) = removed else {
            return Ok(false);
        };

        if !journal::ensure_journal_gone(folder.local_path()) {
            tracing::warn!("Journal of removed folder {} is still present", alias);
        }

        tracing::info!("Removed folder {}", alias);
        self.emit(SchedulerEvent::FolderRemoved {
            alias: alias.to_string(),
        });
        Ok(true)
    }

    /// Enable or disable a folder. Disabling drops it from the queue;
    /// enabling schedules it.
    ///
    /// # Returns
    /// `false` if the alias is unknown
    pub fn slot_enable_folder(&self, alias: &str, enabled: bool) -> bool {
        {
            let mut state = self.state();
            let Some(folder) = state.folders.get_mut(alias) else {
                tracing::warn!("Cannot change enabled state of unknown folder {}", alias);
                return false;
            };
            folder.set_enabled(enabled);
            if !enabled {
                state.queue.retain(|queued| queued != alias);
            }
        }

        tracing::info!(
            "Folder {} {}",
            alias,
            if enabled { "enabled" } else { "disabled" }
        );
        if enabled {
            self.slot_schedule_sync(alias);
        }
        true
    }

    /// Progress report: the running job of `alias` has started transferring.
    pub fn slot_folder_sync_started(&self, alias: &str) {
        {
            let mut state = self.state();
            if state.current.as_deref() != Some(alias) {
                tracing::warn!("Ignoring start report of {}, it is not the running folder", alias);
                return;
            }
            if let Some(folder) = state.folders.get_mut(alias) {
                folder.set_sync_result(SyncResult::new(SyncStatus::SyncRunning));
            }
        }

        tracing::debug!("Sync of {} is running", alias);
        self.emit(SchedulerEvent::FolderSyncStateChange {
            alias: alias.to_string(),
            status: SyncStatus::SyncRunning,
        });
    }

    /// Completion report: record `result`, free the slot and start the next
    /// queued folder.
    pub fn slot_folder_sync_finished(&self, alias: &str, result: SyncResult) {
        if self.record_sync_finished(alias, result) {
            self.slot_schedule_folder_sync();
        }
    }

    /// Record the result of the running job and free the slot.
    ///
    /// Returns `false` for a report from a folder that is not running.
    fn record_sync_finished(&self, alias: &str, result: SyncResult) -> bool {
        {
            let mut state = self.state();
            if state.current.as_deref() != Some(alias) {
                tracing::warn!(
                    "Ignoring finish report of {}, it is not the running folder",
                    alias
                );
                return false;
            }
            state.current = None;
            if let Some(folder) = state.folders.get_mut(alias) {
                folder.set_sync_result(result.clone());
            }
        }

        match result.error() {
            Some(error) => tracing::warn!("Sync of {} finished: {} ({})", alias, result.status(), error),
            None => tracing::info!("Sync of {} finished: {}", alias, result.status()),
        }
        self.inner.metrics.record_sync_finished();
        self.emit(SchedulerEvent::FolderSyncStateChange {
            alias: alias.to_string(),
            status: result.status(),
        });
        true
    }

    /// Abort the running job of `alias` (`None` or "" selects the running
    /// folder). Records an aborted result, frees the slot and starts the
    /// next queued folder. A later finish report of the aborted job is
    /// ignored.
    ///
    /// # Returns
    /// `true` if a running job was aborted
    pub fn terminate_sync_process(&self, alias: Option<&str>) -> bool {
        let (alias, backend) = {
            let mut state = self.state();
            let Some(current) = state.current.clone() else {
                tracing::debug!("No sync running, nothing to terminate");
                return false;
            };
            match alias.filter(|a| !a.is_empty()) {
                Some(requested) if requested != current => {
                    tracing::debug!("{} is not running, nothing to terminate", requested);
                    return false;
                }
                _ => {}
            }

            state.current = None;
            let Some(folder) = state.folders.get_mut(&current) else {
                return false;
            };
            folder.set_sync_result(SyncResult::with_error(
                SyncStatus::Aborted,
                "Sync was aborted",
            ));
            (current, folder.backend())
        };

        tracing::info!("Terminating sync of {}", alias);
        backend.abort_sync();
        self.inner.metrics.record_sync_aborted();
        self.emit(SchedulerEvent::FolderSyncStateChange {
            alias,
            status: SyncStatus::Aborted,
        });

        self.slot_schedule_folder_sync();
        true
    }

    /// Drop all folders and the queue, aborting the running job.
    ///
    /// # Returns
    /// Number of folders unloaded
    pub fn unload_all_folders(&self) -> usize {
        let (count, running) = {
            let mut state = self.state();
            let running = state
                .current
                .take()
                .and_then(|alias| state.folders.get(&alias).map(|f| (alias, f.backend())));
            let count = state.folders.len();
            state.folders.clear();
            state.queue.clear();
            (count, running)
        };

        if let Some((alias, backend)) = running {
            tracing::info!("Aborting sync of {} while unloading", alias);
            backend.abort_sync();
            self.inner.metrics.record_sync_aborted();
        }

        if count > 0 {
            tracing::info!("Unloaded {} folders", count);
        }
        count
    }

    /// Global sync switch. Re-enabling starts the next queued folder.
    pub fn set_sync_enabled(&self, enabled: bool) {
        let changed = {
            let mut state = self.state();
            let changed = state.sync_enabled != enabled;
            state.sync_enabled = enabled;
            changed
        };

        if changed {
            tracing::info!("Sync {}", if enabled { "enabled" } else { "disabled" });
            self.emit(SchedulerEvent::SyncEnabledChanged { enabled });
        }
        if enabled {
            self.slot_schedule_folder_sync();
        }
    }

    /// Disable syncing until the returned guard is dropped.
    pub fn sync_disabler(&self) -> SyncDisabler<'_> {
        SyncDisabler::new(self)
    }

    /// Queue every enabled folder, in load order.
    pub fn slot_schedule_all_folders(&self) {
        let aliases: Vec<String> = self
            .state()
            .folders
            .values()
            .filter(|folder| folder.is_enabled())
            .map(|folder| folder.alias().to_string())
            .collect();

        for alias in aliases {
            self.slot_schedule_sync(&alias);
        }
    }

    /// Queue one folder and start it if the slot is free.
    ///
    /// Unknown or disabled folders are ignored, as are folders that are
    /// already queued or running.
    ///
    /// # Returns
    /// `true` if the folder was added to the queue
    pub fn slot_schedule_sync(&self, alias: &str) -> bool {
        let queued = {
            let mut state = self.state();
            match state.folders.get(alias) {
                None => {
                    tracing::debug!("Not scheduling unknown folder {}", alias);
                    false
                }
                Some(folder) if !folder.is_enabled() => {
                    tracing::debug!("Not scheduling disabled folder {}", alias);
                    false
                }
                Some(_) if state.current.as_deref() == Some(alias) => {
                    tracing::debug!("{} is syncing already, not scheduling", alias);
                    false
                }
                Some(_) if state.queue.iter().any(|queued| queued == alias) => {
                    tracing::debug!("{} is queued already", alias);
                    false
                }
                Some(_) => {
                    state.queue.push_back(alias.to_string());
                    true
                }
            }
        };

        if queued {
            tracing::info!("Scheduled {} for sync", alias);
        }
        self.slot_schedule_folder_sync();
        queued
    }

    /// Start queued folders until one is running, the queue is empty or
    /// sync is disabled.
    ///
    /// A backend that fails to start or finishes inside `start_sync` frees
    /// the slot again, and the loop moves on to the next folder. Calls made
    /// while the loop is active (from such a backend) return immediately.
    fn slot_schedule_folder_sync(&self) {
        {
            let mut state = self.state();
            if state.scheduling {
                return;
            }
            state.scheduling = true;
        }

        while let Some((alias, backend)) = self.claim_next_job() {
            tracing::info!("Starting sync of {}", alias);
            self.inner.metrics.record_sync_started();
            self.emit(SchedulerEvent::FolderSyncStateChange {
                alias: alias.clone(),
                status: SyncStatus::SyncPrepare,
            });

            let notifier = SyncNotifier::new(alias.clone(), Arc::downgrade(&self.inner));
            if let Err(e) = backend.start_sync(notifier) {
                tracing::warn!("Unable to start sync of {}: {:#}", alias, e);
                self.record_sync_finished(
                    &alias,
                    SyncResult::with_error(SyncStatus::SetupError, format!("{:#}", e)),
                );
            }
        }
    }

    /// Take the slot for the next enabled queued folder.
    ///
    /// Ends the scheduling loop (under the same lock) when nothing can start.
    fn claim_next_job(&self) -> Option<(String, Arc<dyn FolderBackend>)> {
        let mut guard = self.state();
        let state = &mut *guard;

        let next = Self::next_job(state);
        if next.is_none() {
            state.scheduling = false;
        }
        next
    }

    fn next_job(state: &mut SchedulerState) -> Option<(String, Arc<dyn FolderBackend>)> {
        if let Some(current) = &state.current {
            tracing::debug!("Sync of {} still running, not starting another", current);
            return None;
        }
        if !state.sync_enabled {
            tracing::debug!("Sync is disabled, not starting a job");
            return None;
        }

        let alias = loop {
            let alias = state.queue.pop_front()?;
            if state.folders.get(&alias).is_some_and(Folder::is_enabled) {
                break alias;
            }
            tracing::debug!("Dropping {} from the queue", alias);
        };
        let folder = state.folders.get_mut(&alias)?;
        folder.set_sync_result(SyncResult::new(SyncStatus::SyncPrepare));
        let backend = folder.backend();
        state.current = Some(alias.clone());
        Some((alias, backend))
    }

    fn insert_folder(&self, definition: FolderDefinition) -> Result<(), SchedulerError> {
        let backend = self.create_backend(&definition)?;
        let alias = definition.alias.clone();

        let mut state = self.state();
        if state.folders.contains_key(&alias) {
            return Err(SchedulerError::AliasExists(alias));
        }
        tracing::debug!("Loaded folder {} ({})", alias, definition.local_path);
        state.folders.insert(alias, Folder::new(definition, backend));
        Ok(())
    }

    fn create_backend(
        &self,
        definition: &FolderDefinition,
    ) -> Result<Arc<dyn FolderBackend>, SchedulerError> {
        self.inner
            .backends
            .create(definition)
            .map_err(|source| SchedulerError::Backend {
                alias: definition.alias.clone(),
                source,
            })
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent) {
        // Ignore send errors (no subscribers is fine)
        let _ = self.inner.events_tx.send(event);
    }
}

/// Scope guard that keeps syncing disabled while alive.
///
/// Sync is re-enabled on drop, which also starts the next queued folder.
pub struct SyncDisabler<'a> {
    scheduler: &'a SyncScheduler,
}

impl<'a> SyncDisabler<'a> {
    pub fn new(scheduler: &'a SyncScheduler) -> Self {
        scheduler.set_sync_enabled(false);
        Self { scheduler }
    }
}

impl Drop for SyncDisabler<'_> {
    fn drop(&mut self) {
        self.scheduler.set_sync_enabled(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientConfig, ProxyKind, ProxySettings};
    use folder::MockFolderBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::runtime::Handle;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Backend that records calls and never finishes on its own
    #[derive(Default)]
    struct RecordingBackend {
        starts: AtomicUsize,
        aborts: AtomicUsize,
        notifier: Mutex<Option<SyncNotifier>>,
    }

    impl FolderBackend for RecordingBackend {
        fn start_sync(&self, notifier: SyncNotifier) -> anyhow::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            *self.notifier.lock().unwrap() = Some(notifier);
            Ok(())
        }

        fn abort_sync(&self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RecordingBackend {
        fn finish(&self, status: SyncStatus) {
            let notifier = self.notifier.lock().unwrap().take().unwrap();
            notifier.finished(SyncResult::new(status));
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        backends: Mutex<IndexMap<String, Arc<RecordingBackend>>>,
    }

    impl RecordingFactory {
        fn backend(&self, alias: &str) -> Arc<RecordingBackend> {
            self.backends.lock().unwrap().get(alias).unwrap().clone()
        }
    }

    impl FolderBackendFactory for RecordingFactory {
        fn create(&self, definition: &FolderDefinition) -> anyhow::Result<Arc<dyn FolderBackend>> {
            let backend = Arc::new(RecordingBackend::default());
            self.backends
                .lock()
                .unwrap()
                .insert(definition.alias.clone(), backend.clone());
            Ok(backend)
        }
    }

    struct MockFactory;

    impl FolderBackendFactory for MockFactory {
        fn create(&self, _definition: &FolderDefinition) -> anyhow::Result<Arc<dyn FolderBackend>> {
            let mut backend = MockFolderBackend::new();
            backend
                .expect_start_sync()
                .returning(|_| Err(anyhow::anyhow!("engine missing")));
            backend.expect_abort_sync().returning(|| ());
            Ok(Arc::new(backend))
        }
    }

    fn setup(
        factory: Arc<dyn FolderBackendFactory>,
        aliases: &[&str],
    ) -> (SyncScheduler, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let config = ConfigManager::new(root.join("config")).unwrap();
        for alias in aliases {
            config
                .save_folder_definition(&FolderDefinition::new(
                    "owncloud",
                    *alias,
                    root.join(alias),
                    format!("/{}", alias),
                    false,
                ))
                .unwrap();
        }
        (SyncScheduler::new(config, factory), temp_dir)
    }

    #[test]
    fn test_jobs_run_one_at_a_time_in_order() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a", "b", "c"]);

        assert_eq!(scheduler.setup_folders().unwrap(), 3);
        scheduler.slot_schedule_all_folders();

        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("a"));
        assert_eq!(scheduler.pending_queue(), vec!["b", "c"]);
        assert_eq!(factory.backend("b").starts.load(Ordering::SeqCst), 0);

        factory.backend("a").finish(SyncStatus::Success);
        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("b"));
        assert_eq!(scheduler.sync_result("a").status(), SyncStatus::Success);

        factory.backend("b").finish(SyncStatus::Error);
        factory.backend("c").finish(SyncStatus::Success);
        assert_eq!(scheduler.current_sync_folder(), None);
        assert!(scheduler.pending_queue().is_empty());
        assert_eq!(scheduler.metrics().syncs_finished.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_schedule_sync_ignores_duplicates() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a", "b"]);
        scheduler.setup_folders().unwrap();

        assert!(scheduler.slot_schedule_sync("a"));
        assert!(scheduler.slot_schedule_sync("b"));
        assert!(!scheduler.slot_schedule_sync("a"));
        assert!(!scheduler.slot_schedule_sync("b"));
        assert!(!scheduler.slot_schedule_sync("missing"));
        assert_eq!(scheduler.pending_queue(), vec!["b"]);
        assert_eq!(factory.backend("a").starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_finish_report_is_ignored() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a", "b"]);
        scheduler.setup_folders().unwrap();
        scheduler.slot_schedule_all_folders();

        scheduler.slot_folder_sync_finished("b", SyncResult::success());
        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("a"));
        assert!(scheduler.sync_result("b").is_undefined());
    }

    #[test]
    fn test_started_report_marks_running() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a"]);
        scheduler.setup_folders().unwrap();
        let mut rx = scheduler.subscribe();
        scheduler.slot_schedule_sync("a");

        assert_eq!(
            rx.try_recv().unwrap(),
            SchedulerEvent::FolderSyncStateChange {
                alias: "a".to_string(),
                status: SyncStatus::SyncPrepare
            }
        );
        factory
            .backend("a")
            .notifier
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .started();
        assert_eq!(scheduler.sync_result("a").status(), SyncStatus::SyncRunning);
    }

    #[test]
    fn test_terminate_advances_queue() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a", "b"]);
        scheduler.setup_folders().unwrap();
        scheduler.slot_schedule_all_folders();

        assert!(!scheduler.terminate_sync_process(Some("b")));
        assert!(scheduler.terminate_sync_process(None));
        assert_eq!(factory.backend("a").aborts.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.sync_result("a").status(), SyncStatus::Aborted);
        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("b"));
        assert!(scheduler.pending_queue().is_empty());
        assert_eq!(factory.backend("b").starts.load(Ordering::SeqCst), 1);

        // Late report from the aborted job changes nothing
        factory.backend("a").finish(SyncStatus::Aborted);
        assert_eq!(scheduler.sync_result("a").status(), SyncStatus::Aborted);
        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("b"));
    }

    #[test]
    fn test_removing_running_folder_starts_next() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a", "b"]);
        scheduler.setup_folders().unwrap();
        scheduler.slot_schedule_all_folders();

        assert!(scheduler.slot_remove_folder("a").unwrap());
        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("b"));
        assert_eq!(scheduler.aliases(), vec!["b"]);
    }

    #[test]
    fn test_synchronous_backends_do_not_nest() {
        thread_local! {
            static DEPTH: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
            static MAX_DEPTH: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
        }

        struct InstantBackend;

        impl FolderBackend for InstantBackend {
            fn start_sync(&self, notifier: SyncNotifier) -> anyhow::Result<()> {
                let depth = DEPTH.with(|d| {
                    d.set(d.get() + 1);
                    d.get()
                });
                MAX_DEPTH.with(|m| m.set(m.get().max(depth)));
                notifier.finished(SyncResult::success());
                DEPTH.with(|d| d.set(d.get() - 1));
                Ok(())
            }

            fn abort_sync(&self) {}
        }

        struct InstantFactory;

        impl FolderBackendFactory for InstantFactory {
            fn create(&self, _: &FolderDefinition) -> anyhow::Result<Arc<dyn FolderBackend>> {
                Ok(Arc::new(InstantBackend))
            }
        }

        let aliases: Vec<String> = (0..50).map(|i| format!("f{:02}", i)).collect();
        let alias_refs: Vec<&str> = aliases.iter().map(String::as_str).collect();
        let (scheduler, _temp_dir) = setup(Arc::new(InstantFactory), &alias_refs);
        scheduler.setup_folders().unwrap();
        scheduler.slot_schedule_all_folders();

        assert_eq!(MAX_DEPTH.with(|m| m.get()), 1);
        assert_eq!(scheduler.current_sync_folder(), None);
        assert_eq!(scheduler.metrics().syncs_finished.load(Ordering::Relaxed), 50);
    }

    #[test]
    fn test_start_failure_records_setup_error_and_advances() {
        let (scheduler, _temp_dir) = setup(Arc::new(MockFactory), &["a", "b"]);
        scheduler.setup_folders().unwrap();
        scheduler.slot_schedule_all_folders();

        assert_eq!(scheduler.sync_result("a").status(), SyncStatus::SetupError);
        assert_eq!(scheduler.sync_result("a").error(), Some("engine missing"));
        assert_eq!(scheduler.sync_result("b").status(), SyncStatus::SetupError);
        assert_eq!(scheduler.current_sync_folder(), None);
    }

    #[test]
    fn test_disabled_folder_is_skipped() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a", "b", "c"]);
        scheduler.setup_folders().unwrap();
        scheduler.slot_schedule_all_folders();

        assert!(scheduler.slot_enable_folder("b", false));
        assert_eq!(scheduler.pending_queue(), vec!["c"]);

        factory.backend("a").finish(SyncStatus::Success);
        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("c"));
        assert!(!scheduler.slot_enable_folder("missing", true));
    }

    #[test]
    fn test_sync_disabler_holds_queue() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a"]);
        scheduler.setup_folders().unwrap();
        let mut rx = scheduler.subscribe();

        {
            let _disabler = scheduler.sync_disabler();
            assert!(!scheduler.is_sync_enabled());
            scheduler.slot_schedule_sync("a");
            assert_eq!(scheduler.current_sync_folder(), None);
            assert_eq!(scheduler.pending_queue(), vec!["a"]);
        }

        assert!(scheduler.is_sync_enabled());
        assert_eq!(scheduler.current_sync_folder().as_deref(), Some("a"));
        assert_eq!(
            rx.try_recv().unwrap(),
            SchedulerEvent::SyncEnabledChanged { enabled: false }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SchedulerEvent::SyncEnabledChanged { enabled: true }
        );
    }

    #[test]
    fn test_unload_aborts_running_job() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, _temp_dir) = setup(factory.clone(), &["a", "b"]);
        scheduler.setup_folders().unwrap();
        scheduler.slot_schedule_all_folders();

        assert_eq!(scheduler.unload_all_folders(), 2);
        assert_eq!(factory.backend("a").aborts.load(Ordering::SeqCst), 1);
        assert!(scheduler.aliases().is_empty());
        assert!(scheduler.pending_queue().is_empty());
        assert_eq!(scheduler.current_sync_folder(), None);
    }

    #[test]
    fn test_add_folder_definition_rejects_duplicates() {
        let factory = Arc::new(RecordingFactory::default());
        let (scheduler, temp_dir) = setup(factory, &["a"]);
        scheduler.setup_folders().unwrap();
        let local = Utf8PathBuf::try_from(temp_dir.path().join("new")).unwrap();

        assert!(matches!(
            scheduler.add_folder_definition("owncloud", "a", &local, "/x", false),
            Err(SchedulerError::AliasExists(_))
        ));
        assert!(matches!(
            scheduler.add_folder_definition("owncloud", "", &local, "/x", false),
            Err(SchedulerError::EmptyAlias)
        ));

        scheduler
            .add_folder_definition("owncloud", "new", &local, "/New", true)
            .unwrap();
        assert!(scheduler.config().folder_definition_exists("new"));
        assert_eq!(scheduler.folder("new").unwrap().remote_path(), "/New");
    }

    #[tokio::test]
    async fn test_set_proxy_forwards_to_client() {
        let (scheduler, _temp_dir) = setup(Arc::new(RecordingFactory::default()), &[]);
        let mut client_config = ClientConfig::default();
        client_config.proxy = ProxySettings {
            kind: ProxyKind::Http,
            host: "proxy.lan".to_string(),
            port: 3128,
            ..Default::default()
        };
        scheduler
            .config()
            .save_client_config("", &client_config)
            .unwrap();

        let client =
            ProtocolClient::new(Arc::new(scheduler.config().clone()), Handle::current()).unwrap();
        client.set_certs_untrusted(true);
        assert_eq!(client.proxy(), None);

        scheduler.set_protocol_client(client.clone());
        scheduler.set_proxy();

        assert_eq!(client.proxy(), Some(client_config.proxy));
        assert!(!client.certs_untrusted());
    }

    #[test]
    fn test_set_proxy_without_client_is_noop() {
        let (scheduler, _temp_dir) = setup(Arc::new(RecordingFactory::default()), &[]);
        scheduler.set_proxy();
    }

    #[test]
    fn test_no_events_without_changes() {
        let (scheduler, _temp_dir) = setup(Arc::new(RecordingFactory::default()), &[]);
        let mut rx = scheduler.subscribe();
        scheduler.set_sync_enabled(true);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
