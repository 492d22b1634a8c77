// FolderSync - folder sync scheduling and server protocol client
//
// This is the library crate containing the scheduler, the protocol client and
// the configuration store. The binary crate (main.rs) wires them together.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, ConnectionStore};
pub use models::{ClientConfig, FolderDefinition, SyncResult, SyncStatus};
pub use scheduler::{ConfigFolderWatcher, SchedulerEvent, SyncDisabler, SyncScheduler};
pub use services::{ProtocolClient, ProtocolEvent, RequestId};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
