//! Data models for the folder sync client.
//!
//! - [`FolderDefinition`]: a persisted sync folder (alias, local and remote path, backend)
//! - [`SyncResult`] / [`SyncStatus`]: snapshot of a folder's most recent sync run
//! - [`ClientConfig`]: server connections and proxy settings for one config handle
//!
//! All persisted structs derive `Serialize`/`Deserialize` for the YAML store
//! managed by [`ConfigManager`](crate::config::ConfigManager).

pub mod config;
pub mod folder;

pub use config::{ClientConfig, ConnectionSettings, ProxyKind, ProxySettings, normalize_base_url};
pub use folder::{FolderDefinition, JOURNAL_FILE_NAME, SyncResult, SyncStatus, journal_path_for};
