//! Services module - server protocol and local journal maintenance.
//!
//! # Components
//!
//! - [`ProtocolClient`]: discovery via `status.php`, WebDAV GET and MKCOL, with
//!   manual redirect following, credentials and certificate chain capture.
//!   Outcomes are published as [`ProtocolEvent`]s.
//! - [`Transport`]: the seam between the client and HTTP. [`ReqwestTransport`]
//!   is the production implementation; tests substitute a mock.
//! - [`parse_status`]: reader for the `status.php` document.
//! - [`journal`]: removal of sync journals and the "start from scratch" reset
//!   of a local directory.
//!
//! These services have no knowledge of folder scheduling; the
//! [`SyncScheduler`](crate::scheduler::SyncScheduler) uses them.

pub mod journal;
pub mod protocol;
pub mod status;
pub mod transport;

pub use protocol::{
    Credentials, DEFAULT_CONNECTION, MAX_REDIRECTS, ProtocolClient, ProtocolError, ProtocolEvent,
    RequestId, RequestPurpose, STATUS_ENDPOINT, WEBDAV_PATH,
};
pub use status::{InstallationInfo, ServerStatus, parse_status};
pub use transport::{
    Certificate, NetworkError, Reply, ReqwestTransport, Transport, TransportRequest,
    TransportSettings,
};
