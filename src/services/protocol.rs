//! Server protocol client.
//!
//! [`ProtocolClient`] issues discovery (`status.php`), WebDAV GET and MKCOL
//! requests against the configured server and reports the outcome as
//! [`ProtocolEvent`]s on a broadcast channel. Redirects are followed manually
//! so the client can learn the server's real base URL and stop redirect loops.

use super::status::parse_status;
use super::transport::{
    Certificate, NetworkError, Reply, ReqwestTransport, Transport, TransportRequest,
    TransportSettings,
};
use crate::config::ConnectionStore;
use crate::metrics::Metrics;
use crate::models::ProxySettings;
use base64::Engine;
use reqwest::Method;
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HOST, HeaderMap, HeaderValue, USER_AGENT,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use url::Url;

/// WebDAV root, relative to the server base URL.
pub const WEBDAV_PATH: &str = "remote.php/webdav/";

/// Discovery endpoint, relative to the server base URL.
pub const STATUS_ENDPOINT: &str = "status.php";

/// Credentials key used when no custom config handle is active.
pub const DEFAULT_CONNECTION: &str = "default";

/// Redirect signals accepted before a chain is treated as a loop.
pub const MAX_REDIRECTS: u32 = 10;

const UNKNOWN_PATH: &str = "unknown";

/// Identifier of an issued request, echoed in every resulting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPurpose {
    Discovery,
    WebDavGet,
    Mkdir,
}

/// Outcome notifications of the protocol client.
///
/// `request` is always the id returned by the call that started the
/// exchange, also when the answer arrived on a redirect follow-up.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// `status.php` answered with version, versionstring and edition.
    InstallationFound {
        request: RequestId,
        /// Reply URL without the trailing `/status.php`.
        url: String,
        version_string: String,
        version: String,
        edition: String,
    },

    /// `status.php` answered, but not with a usable status document.
    NoInstallationFound { request: RequestId, reply: Reply },

    /// A WebDAV GET completed; inspect `reply` for the outcome.
    DirectoryExists {
        request: RequestId,
        path: String,
        reply: Reply,
    },

    /// A MKCOL completed; `error` is `None` on success.
    CollectionCreated {
        request: RequestId,
        error: Option<NetworkError>,
    },

    /// TLS verification failed. The caller decides whether to call
    /// [`ProtocolClient::set_certs_untrusted`] and retry.
    SslFailed {
        request: RequestId,
        errors: Vec<String>,
    },

    /// User-facing guidance for proxy failures.
    GuiLog { title: String, message: String },
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("No server URL configured for connection '{0}'")]
    NotConfigured(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Unable to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    fn basic_auth_value(&self) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.user, self.password));
        format!("Basic {}", token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Metadata of an in-flight request.
#[derive(Debug, Clone)]
struct RequestContext {
    purpose: RequestPurpose,
    /// Requested WebDAV path, `None` when unknown.
    path: Option<String>,
    config_handle: String,
    /// Send credentials; discovery requests, and their redirects, go out
    /// without them.
    authenticated: bool,
    /// Request that started the chain this request belongs to.
    origin: Option<RequestId>,
}

impl RequestContext {
    fn new(purpose: RequestPurpose, path: Option<String>, config_handle: String) -> Self {
        Self {
            purpose,
            path,
            config_handle,
            authenticated: purpose != RequestPurpose::Discovery,
            origin: None,
        }
    }

    /// Best guess for a reply nobody tracked.
    fn untracked(reply: &Reply) -> Self {
        let purpose = if reply.url.path().ends_with(STATUS_ENDPOINT) {
            RequestPurpose::Discovery
        } else {
            RequestPurpose::WebDavGet
        };
        Self::new(purpose, None, String::new())
    }

    /// Server-relative path the redirect target must end with.
    fn logical_path(&self) -> String {
        match self.path.as_deref() {
            None | Some("") => STATUS_ENDPOINT.to_string(),
            Some(path) => format!("{}{}", WEBDAV_PATH, path),
        }
    }
}

#[derive(Debug, Default)]
struct RedirectState {
    /// Base URL learned from the last followed redirect.
    base_override: Option<String>,
    hop_count: u32,
}

struct ClientState {
    config_handle: String,
    connection: String,
    credentials: HashMap<String, Credentials>,
    requests: HashMap<RequestId, RequestContext>,
    redirect: RedirectState,
    certs_untrusted: bool,
    auth_attempts: u32,
    /// Proxy set at runtime, takes precedence over the stored one.
    proxy: Option<ProxySettings>,
}

struct ClientInner {
    store: Arc<dyn ConnectionStore>,
    runtime: Handle,
    transport: RwLock<Arc<dyn Transport>>,
    state: Mutex<ClientState>,
    certificate_chain: Mutex<Vec<Certificate>>,
    next_id: AtomicU64,
    events_tx: broadcast::Sender<ProtocolEvent>,
    metrics: Metrics,
}

/// Client for the server's discovery and WebDAV endpoints.
///
/// Cheap to clone; clones share all state. Requests run on the runtime
/// passed at construction and report through [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct ProtocolClient {
    inner: Arc<ClientInner>,
}

impl ProtocolClient {
    /// Create a client with a `reqwest` transport built from the default
    /// config handle.
    pub fn new(store: Arc<dyn ConnectionStore>, runtime: Handle) -> Result<Self, ProtocolError> {
        let settings = TransportSettings::from_store(store.as_ref(), "");
        let transport = ReqwestTransport::new(&settings)?;
        Ok(Self::with_transport(store, Arc::new(transport), runtime))
    }

    pub fn with_transport(
        store: Arc<dyn ConnectionStore>,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(100);
        let state = ClientState {
            config_handle: String::new(),
            connection: crate::APP_NAME.to_string(),
            credentials: HashMap::new(),
            requests: HashMap::new(),
            redirect: RedirectState::default(),
            certs_untrusted: false,
            auth_attempts: 0,
            proxy: None,
        };

        Self {
            inner: Arc::new(ClientInner {
                store,
                runtime,
                transport: RwLock::new(transport),
                state: Mutex::new(state),
                certificate_chain: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                events_tx,
                metrics: Metrics::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Name of the connection looked up in the config store.
    pub fn connection_name(&self) -> String {
        self.state().connection.clone()
    }

    pub fn set_connection_name(&self, name: impl Into<String>) {
        self.state().connection = name.into();
    }

    /// Replace the transport. Clears the manual certificate trust override.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self
            .inner
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transport;
        self.state().certs_untrusted = false;
        tracing::debug!("HTTP transport replaced");
    }

    /// Rebuild the `reqwest` transport from the active config handle (CA
    /// bundle, proxy).
    pub fn rebuild_transport(&self) -> Result<(), ProtocolError> {
        let (handle, proxy) = {
            let state = self.state();
            (state.config_handle.clone(), state.proxy.clone())
        };
        let mut settings = TransportSettings::from_store(self.inner.store.as_ref(), &handle);
        if let Some(proxy) = proxy {
            settings.proxy = proxy;
        }
        let transport = ReqwestTransport::new(&settings)?;
        self.set_transport(Arc::new(transport));
        Ok(())
    }

    /// Proxy settings applied with [`set_proxy`](Self::set_proxy), if any.
    pub fn proxy(&self) -> Option<ProxySettings> {
        self.state().proxy.clone()
    }

    /// Apply proxy settings to all subsequent requests.
    pub fn set_proxy(&self, proxy: ProxySettings) -> Result<(), ProtocolError> {
        tracing::info!("Applying proxy settings: {:?}", proxy.kind);
        self.state().proxy = Some(proxy);
        self.rebuild_transport()
    }

    /// A server URL is stored for the active handle and connection.
    pub fn is_configured(&self) -> bool {
        let (handle, connection) = {
            let state = self.state();
            (state.config_handle.clone(), state.connection.clone())
        };
        self.inner.store.connection_exists(&handle, &connection)
    }

    /// Query `status.php` below the configured base URL.
    ///
    /// Resets the redirect hop counter. Answers with
    /// [`ProtocolEvent::InstallationFound`] or [`ProtocolEvent::NoInstallationFound`].
    pub fn check_installation(&self) -> Result<RequestId, ProtocolError> {
        let (handle, connection) = {
            let mut state = self.state();
            state.redirect.hop_count = 0;
            (state.config_handle.clone(), state.connection.clone())
        };
        let base = self
            .inner
            .store
            .base_url(&handle, &connection)
            .ok_or_else(|| ProtocolError::NotConfigured(connection.clone()))?;
        let url = Url::parse(&format!("{}{}", base, STATUS_ENDPOINT))?;

        tracing::info!("Checking server installation at {}", url);
        let context = RequestContext::new(RequestPurpose::Discovery, None, handle);
        Ok(self.issue(Method::GET, url, None, context))
    }

    /// GET a path below the WebDAV root. Answers with
    /// [`ProtocolEvent::DirectoryExists`].
    pub fn get_webdav_path(&self, path: &str) -> Result<RequestId, ProtocolError> {
        let handle = {
            let mut state = self.state();
            state.redirect.hop_count = 0;
            state.config_handle.clone()
        };
        let url = Url::parse(&format!("{}{}", self.webdav_url(None)?, path))?;

        tracing::debug!("Requesting WebDAV path {}", url);
        let context =
            RequestContext::new(RequestPurpose::WebDavGet, Some(path.to_string()), handle);
        Ok(self.issue(Method::GET, url, None, context))
    }

    /// Create a collection below the WebDAV root. Answers with
    /// [`ProtocolEvent::CollectionCreated`].
    pub fn mkdir_request(&self, dir: &str) -> Result<RequestId, ProtocolError> {
        let handle = {
            let mut state = self.state();
            state.auth_attempts = 0;
            state.config_handle.clone()
        };
        let url = Url::parse(&format!("{}{}", self.webdav_url(None)?, dir))?;
        let method =
            Method::from_bytes(b"MKCOL").map_err(|e| ProtocolError::InvalidMethod(e.to_string()))?;

        tracing::info!("Creating remote collection {}", url);
        let context = RequestContext::new(RequestPurpose::Mkdir, Some(dir.to_string()), handle);
        Ok(self.issue(method, url, None, context))
    }

    /// Store credentials for a connection (`None` selects the default key).
    pub fn set_credentials(&self, user: &str, password: &str, connection: Option<&str>) {
        let key = connection
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONNECTION)
            .to_string();
        let mut state = self.state();
        if state.credentials.contains_key(&key) {
            tracing::info!("Overwriting credentials for connection {}", key);
        }
        state
            .credentials
            .insert(key, Credentials::new(user, password));
    }

    /// Switch to another config handle ("" is the default configuration).
    ///
    /// Resets the authentication attempt counter and the certificate trust
    /// override.
    pub fn set_custom_config_handle(&self, handle: &str) {
        let mut state = self.state();
        state.config_handle = handle.to_string();
        state.auth_attempts = 0;
        state.certs_untrusted = false;
    }

    /// Config handle of a tracked request, or the active handle for `None`.
    ///
    /// Untracked requests yield the empty (default) handle.
    pub fn config_handle(&self, request: Option<RequestId>) -> String {
        let state = self.state();
        match request {
            Some(id) => state
                .requests
                .get(&id)
                .map(|context| context.config_handle.clone())
                .unwrap_or_default(),
            None => state.config_handle.clone(),
        }
    }

    /// Accept certificates that fail verification on subsequent requests.
    pub fn set_certs_untrusted(&self, untrusted: bool) {
        if untrusted {
            tracing::warn!("Certificate verification disabled by user override");
        }
        self.state().certs_untrusted = untrusted;
    }

    pub fn certs_untrusted(&self) -> bool {
        self.state().certs_untrusted
    }

    pub fn reset_ssl_untrust(&self) {
        self.state().certs_untrusted = false;
    }

    /// Peer certificates of the most recent TLS reply.
    pub fn certificate_chain(&self) -> Vec<Certificate> {
        self.inner
            .certificate_chain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// WebDAV root URL: the learned redirect base if any, the configured
    /// base URL of `connection` otherwise.
    pub fn webdav_url(&self, connection: Option<&str>) -> Result<String, ProtocolError> {
        let (base_override, handle, active) = {
            let state = self.state();
            (
                state.redirect.base_override.clone(),
                state.config_handle.clone(),
                state.connection.clone(),
            )
        };
        let base = match base_override {
            Some(base) => base,
            None => {
                let connection = connection.unwrap_or(&active);
                self.inner
                    .store
                    .base_url(&handle, connection)
                    .ok_or_else(|| ProtocolError::NotConfigured(connection.to_string()))?
            }
        };
        Ok(format!("{}{}", base, WEBDAV_PATH))
    }

    pub fn auth_attempts(&self) -> u32 {
        self.state().auth_attempts
    }

    pub fn redirect_hops(&self) -> u32 {
        self.state().redirect.hop_count
    }

    /// Requests issued but not yet completed.
    pub fn pending_requests(&self) -> usize {
        self.state().requests.len()
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.inner
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_request_id(&self) -> RequestId {
        RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register the request and hand it to the transport.
    fn issue(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        mut context: RequestContext,
    ) -> RequestId {
        let id = self.next_request_id();
        let origin = *context.origin.get_or_insert(id);
        let purpose = context.purpose;
        let request = self.build_request(
            method,
            url,
            body,
            &context.config_handle,
            context.authenticated,
        );

        tracing::debug!(
            "Issuing {} {} as request {} (origin {})",
            request.method,
            request.url,
            id,
            origin
        );
        self.state().requests.insert(id, context);
        self.inner.metrics.record_request_issued();

        let client = self.clone();
        let transport = self.transport();
        self.inner.runtime.spawn(async move {
            let reply = transport.execute(request).await;
            match purpose {
                RequestPurpose::Mkdir => client.on_mkdir_finished(id, reply),
                RequestPurpose::Discovery | RequestPurpose::WebDavGet => {
                    client.on_reply_finished(id, reply)
                }
            }
        });

        id
    }

    fn build_request(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        config_handle: &str,
        authenticated: bool,
    ) -> TransportRequest {
        let (credentials, accept_invalid_certs) = {
            let state = self.state();
            let key = if config_handle.is_empty() {
                DEFAULT_CONNECTION
            } else {
                config_handle
            };
            let credentials = state
                .credentials
                .get(key)
                .filter(|_| authenticated)
                .cloned();
            (credentials, state.certs_untrusted)
        };

        let mut headers = HeaderMap::new();
        if let Some(host) = url.host_str() {
            let host = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&host) {
                headers.insert(HOST, value);
            }
        }
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))),
        );
        match credentials {
            Some(credentials) => match HeaderValue::from_str(&credentials.basic_auth_value()) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Credentials for {} are not valid header text", url),
            },
            None if authenticated => tracing::debug!("No credentials set for this request"),
            None => {}
        }
        if let Some(body) = body.as_ref().filter(|b| !b.is_empty()) {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/xml; charset=utf-8"),
            );
        }

        TransportRequest {
            method,
            url,
            headers,
            body,
            accept_invalid_certs,
        }
    }

    /// Completion of a discovery or WebDAV GET exchange.
    pub(crate) fn on_reply_finished(&self, id: RequestId, reply: Reply) {
        self.capture_certificates(&reply);

        let context = self.state().requests.remove(&id).unwrap_or_else(|| {
            tracing::debug!("Reply {} for {} was not tracked", id, reply.url);
            RequestContext::untracked(&reply)
        });
        let origin = context.origin.unwrap_or(id);

        if let Some(error) = &reply.error {
            self.on_error(origin, error);
        }

        let mut redirect_target = reply.redirect_target.clone();
        if let Some(target) = &redirect_target {
            let hops = {
                let mut state = self.state();
                state.redirect.hop_count += 1;
                state.redirect.hop_count
            };
            if hops > MAX_REDIRECTS {
                tracing::warn!("Redirect loop while redirecting to {}", target);
                self.inner.metrics.record_redirect_loop_capped();
                redirect_target = None;
            }
        }

        if let Some(target) = redirect_target {
            if let Some(base) = redirect_base(&target, &context.logical_path()) {
                tracing::info!("Redirected to {}, server url is now {}", target, base);
                self.state().redirect.base_override = Some(base);
                self.inner.metrics.record_redirect_followed();

                let follow_up = RequestContext {
                    origin: Some(origin),
                    ..context
                };
                self.issue(Method::GET, target, None, follow_up);
                return;
            }
            tracing::warn!(
                "Path {} is not part of the redirect URL {}, not following",
                context.logical_path(),
                target
            );
        }

        match context.purpose {
            RequestPurpose::Discovery => self.on_status_reply(id, origin, reply),
            RequestPurpose::WebDavGet | RequestPurpose::Mkdir => {
                self.emit(ProtocolEvent::DirectoryExists {
                    request: origin,
                    path: context.path.unwrap_or_else(|| UNKNOWN_PATH.to_string()),
                    reply,
                });
            }
        }
    }

    fn on_status_reply(&self, id: RequestId, origin: RequestId, reply: Reply) {
        let body = reply.body_text();
        if reply.error.is_none() && body.is_empty() {
            tracing::warn!("Reply {} without content and without error, ignoring", id);
            self.inner.metrics.record_duplicate_completion();
            return;
        }

        tracing::debug!("status.php returns: {} (error: {:?})", body, reply.error);
        match parse_status(&body).installation() {
            Some(info) => {
                let url = reply.url.as_str();
                let url = url
                    .strip_suffix("/status.php")
                    .unwrap_or(url)
                    .to_string();
                tracing::info!("Found server {} at {}", info.version_string, url);
                self.emit(ProtocolEvent::InstallationFound {
                    request: origin,
                    url,
                    version_string: info.version_string,
                    version: info.version,
                    edition: info.edition,
                });
            }
            None => {
                tracing::info!("No proper answer on {}", reply.url);
                self.emit(ProtocolEvent::NoInstallationFound {
                    request: origin,
                    reply,
                });
            }
        }
    }

    /// Completion of a MKCOL exchange.
    pub(crate) fn on_mkdir_finished(&self, id: RequestId, reply: Reply) {
        self.capture_certificates(&reply);

        let origin = self
            .state()
            .requests
            .remove(&id)
            .and_then(|context| context.origin)
            .unwrap_or(id);

        if let Some(error) = &reply.error {
            self.on_error(origin, error);
        }

        tracing::debug!("MKCOL {} finished: {:?}", reply.url, reply.error);
        self.emit(ProtocolEvent::CollectionCreated {
            request: origin,
            error: reply.error,
        });
    }

    fn on_error(&self, request: RequestId, error: &NetworkError) {
        tracing::debug!("Network error on request {}: {}", request, error);

        match error {
            NetworkError::AuthenticationRequired => {
                let attempts = {
                    let mut state = self.state();
                    state.auth_attempts += 1;
                    state.auth_attempts
                };
                if attempts > 1 {
                    tracing::warn!("Too many attempts to authenticate ({})", attempts);
                }
            }
            NetworkError::SslHandshakeFailed(detail) => {
                tracing::warn!("SSL errors on request {}: {}", request, detail);
                self.emit(ProtocolEvent::SslFailed {
                    request,
                    errors: vec![detail.clone()],
                });
            }
            _ => {}
        }

        if let Some((title, message)) = proxy_guidance(error) {
            tracing::warn!("{}: {}", title, message);
            self.emit(ProtocolEvent::GuiLog {
                title: title.to_string(),
                message: message.to_string(),
            });
        }
    }

    fn capture_certificates(&self, reply: &Reply) {
        if let Some(chain) = &reply.peer_certificates {
            *self
                .inner
                .certificate_chain
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = chain.clone();
        }
    }

    fn emit(&self, event: ProtocolEvent) {
        // Ignore send errors (no subscribers is fine)
        let _ = self.inner.events_tx.send(event);
    }
}

/// Base URL implied by a redirect `target` for a request of `logical_path`.
///
/// The target must end with the path (raw or percent-encoded).
fn redirect_base(target: &Url, logical_path: &str) -> Option<String> {
    let target = target.as_str();
    if let Some(base) = target.strip_suffix(logical_path) {
        return Some(base.to_string());
    }
    let encoded = Url::parse("http://localhost/")
        .and_then(|root| root.join(logical_path))
        .ok()?;
    target
        .strip_suffix(encoded.path().trim_start_matches('/'))
        .map(str::to_string)
}

fn proxy_guidance(error: &NetworkError) -> Option<(&'static str, &'static str)> {
    match error {
        NetworkError::ProxyConnectionRefused => Some((
            "Proxy Refused Connection",
            "The configured proxy has refused the connection. Please check the proxy settings.",
        )),
        NetworkError::ProxyConnectionClosed => Some((
            "Proxy Closed Connection",
            "The configured proxy has closed the connection. Please check the proxy settings.",
        )),
        NetworkError::ProxyNotFound => Some((
            "Proxy Not Found",
            "The configured proxy could not be found. Please check the proxy settings.",
        )),
        NetworkError::ProxyAuthenticationRequired => Some((
            "Proxy Authentication Error",
            "The configured proxy requires login but the proxy credentials are invalid. Please check the proxy settings.",
        )),
        NetworkError::ProxyTimeout => Some((
            "Proxy Connection Timed Out",
            "The connection to the configured proxy has timed out.",
        )),
        _ => None,
    }
}
