use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the sync-state journal kept inside every synced local directory.
pub const JOURNAL_FILE_NAME: &str = ".csync_journal.db";

/// Persisted definition of one sync folder.
///
/// The alias is not part of the serialized body: it is the (unescaped) file
/// stem of the definition file, see [`crate::config::ConfigManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDefinition {
    #[serde(skip)]
    pub alias: String,

    pub backend: String,

    pub local_path: Utf8PathBuf,

    pub remote_path: String,

    /// Currently unused by the scheduler, carried for the settings dialog.
    #[serde(default)]
    pub only_this_lan: bool,
}

impl FolderDefinition {
    pub fn new(
        backend: impl Into<String>,
        alias: impl Into<String>,
        local_path: impl Into<Utf8PathBuf>,
        remote_path: impl Into<String>,
        only_this_lan: bool,
    ) -> Self {
        Self {
            alias: alias.into(),
            backend: backend.into(),
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            only_this_lan,
        }
    }

    /// Location of this folder's sync journal.
    pub fn journal_path(&self) -> Utf8PathBuf {
        journal_path_for(&self.local_path)
    }
}

/// Journal location for an arbitrary local directory.
pub fn journal_path_for(local_path: &Utf8Path) -> Utf8PathBuf {
    local_path.join(JOURNAL_FILE_NAME)
}

/// Status of the most recent sync run of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// No sync has completed yet (the "unknown" sentinel).
    Undefined,
    NotYetStarted,
    SyncPrepare,
    SyncRunning,
    Success,
    Error,
    SetupError,
    Aborted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Undefined => "undefined",
            SyncStatus::NotYetStarted => "not yet started",
            SyncStatus::SyncPrepare => "preparing",
            SyncStatus::SyncRunning => "running",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::SetupError => "setup error",
            SyncStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of a finished (or in-progress) sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    status: SyncStatus,
    error: Option<String>,
}

impl SyncResult {
    pub fn new(status: SyncStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn with_error(status: SyncStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
        }
    }

    pub fn success() -> Self {
        Self::new(SyncStatus::Success)
    }

    /// Sentinel returned for folders that never completed a sync.
    pub fn undefined() -> Self {
        Self::new(SyncStatus::Undefined)
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_undefined(&self) -> bool {
        self.status == SyncStatus::Undefined
    }
}

impl Default for SyncResult {
    fn default() -> Self {
        Self::undefined()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_path_is_inside_local_dir() {
        let def = FolderDefinition::new("owncloud", "docs", "/home/me/Docs", "/Docs", false);
        assert_eq!(
            def.journal_path(),
            Utf8PathBuf::from("/home/me/Docs/.csync_journal.db")
        );
    }

    #[test]
    fn test_default_result_is_undefined() {
        let result = SyncResult::default();
        assert!(result.is_undefined());
        assert_eq!(result.error(), None);
    }

    #[test]
    fn test_result_with_error() {
        let result = SyncResult::with_error(SyncStatus::Error, "disk full");
        assert_eq!(result.status(), SyncStatus::Error);
        assert_eq!(result.error(), Some("disk full"));
        assert!(!result.is_undefined());
    }

    #[test]
    fn test_alias_not_serialized() {
        let def = FolderDefinition::new("owncloud", "docs", "/tmp/docs", "/Docs", true);
        let yaml = serde_yaml_ng::to_string(&def).unwrap();
        assert!(!yaml.contains("alias"));
        assert!(yaml.contains("only_this_lan: true"));

        let loaded: FolderDefinition = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(loaded.alias, "");
        assert_eq!(loaded.remote_path, "/Docs");
    }
}
