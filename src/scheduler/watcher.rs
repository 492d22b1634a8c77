//! Reload folder definitions when the definition directory changes.

use super::SyncScheduler;
use crate::config::DEFINITION_EXTENSION;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Quiet period after the first change before the definitions are re-read
const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Watches the folder definition directory of a [`SyncScheduler`] and calls
/// [`reparse_configuration`](SyncScheduler::reparse_configuration) whenever
/// a definition file is created, changed or removed.
///
/// Watching stops when this value is dropped.
pub struct ConfigFolderWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ConfigFolderWatcher {
    /// Start watching. Must be called from within a tokio runtime.
    pub fn start(scheduler: SyncScheduler) -> notify::Result<Self> {
        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.blocking_send(res) {
                    tracing::debug!("Config watcher channel closed: {}", e);
                }
            },
            notify::Config::default(),
        )?;

        let folder_dir = scheduler.config().folder_dir().to_path_buf();
        watcher.watch(folder_dir.as_std_path(), RecursiveMode::NonRecursive)?;
        tracing::info!("Watching folder definitions in {}", folder_dir);

        let task = tokio::spawn(async move {
            while let Some(res) = rx.recv().await {
                if !touches_definition(res) {
                    continue;
                }

                // Collapse a burst of writes into a single reload
                tokio::time::sleep(SETTLE_DELAY).await;
                while rx.try_recv().is_ok() {}

                let scheduler = scheduler.clone();
                match tokio::task::spawn_blocking(move || scheduler.reparse_configuration()).await
                {
                    Ok(Ok(count)) => {
                        tracing::info!("Folder definitions changed, {} folders loaded", count)
                    }
                    Ok(Err(e)) => tracing::warn!("Reloading folder definitions failed: {:#}", e),
                    Err(e) => tracing::error!("Reload task failed: {}", e),
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for ConfigFolderWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn touches_definition(res: notify::Result<Event>) -> bool {
    match res {
        Ok(event) => {
            matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) && event.paths.iter().any(|p| is_definition_file(p))
        }
        Err(e) => {
            tracing::warn!("Config watch error: {:?}", e);
            false
        }
    }
}

fn is_definition_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == DEFINITION_EXTENSION)
}
