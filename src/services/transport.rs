//! HTTP transport used by [`ProtocolClient`](super::ProtocolClient).
//!
//! The transport executes exactly one HTTP exchange per call and never follows
//! redirects on its own: redirect targets are handed back in [`Reply`] so the
//! protocol client can apply its own loop guard and base-URL learning.

use crate::config::ConnectionStore;
use crate::models::{ProxyKind, ProxySettings};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, Method, Proxy, redirect};
use thiserror::Error;
use url::Url;

/// Transport-level failure of a request.
///
/// HTTP error statuses are folded into the same taxonomy so callers only
/// inspect one value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Remote host closed the connection")]
    RemoteHostClosed,

    #[error("Host not found")]
    HostNotFound,

    #[error("Operation timed out")]
    Timeout,

    #[error("Operation canceled")]
    OperationCanceled,

    #[error("SSL handshake failed: {0}")]
    SslHandshakeFailed(String),

    #[error("Proxy refused the connection")]
    ProxyConnectionRefused,

    #[error("Proxy closed the connection")]
    ProxyConnectionClosed,

    #[error("Proxy not found")]
    ProxyNotFound,

    #[error("Proxy connection timed out")]
    ProxyTimeout,

    #[error("Proxy requires authentication")]
    ProxyAuthenticationRequired,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Access denied")]
    ContentAccessDenied,

    #[error("Content not found")]
    ContentNotFound,

    #[error("Operation not permitted")]
    ContentOperationNotPermitted,

    #[error("Content conflict")]
    ContentConflict,

    #[error("Client error (HTTP {0})")]
    ClientError(u16),

    #[error("Server error (HTTP {0})")]
    ServerError(u16),

    #[error("Protocol failure: {0}")]
    ProtocolFailure(String),
}

impl NetworkError {
    /// Map an HTTP status onto an error kind; success and redirect statuses map to `None`.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            100..=399 => None,
            401 => Some(NetworkError::AuthenticationRequired),
            403 => Some(NetworkError::ContentAccessDenied),
            404 => Some(NetworkError::ContentNotFound),
            405 => Some(NetworkError::ContentOperationNotPermitted),
            407 => Some(NetworkError::ProxyAuthenticationRequired),
            409 => Some(NetworkError::ContentConflict),
            400..=499 => Some(NetworkError::ClientError(status)),
            _ => Some(NetworkError::ServerError(status)),
        }
    }

    pub fn is_proxy_error(&self) -> bool {
        matches!(
            self,
            NetworkError::ProxyConnectionRefused
                | NetworkError::ProxyConnectionClosed
                | NetworkError::ProxyNotFound
                | NetworkError::ProxyTimeout
                | NetworkError::ProxyAuthenticationRequired
        )
    }
}

/// Coarse failure class of a request that produced no HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connect,
    Body,
    Other,
}

/// Classify a failed exchange.
///
/// `detail` is the flattened error chain; it is only inspected to tell TLS
/// and name-resolution failures apart from plain connection failures.
pub fn classify_failure(kind: FailureKind, detail: &str, via_proxy: bool) -> NetworkError {
    let lower = detail.to_lowercase();
    match kind {
        FailureKind::Timeout if via_proxy => NetworkError::ProxyTimeout,
        FailureKind::Timeout => NetworkError::Timeout,
        FailureKind::Connect
            if lower.contains("certificate")
                || lower.contains("tls")
                || lower.contains("handshake") =>
        {
            NetworkError::SslHandshakeFailed(detail.to_string())
        }
        FailureKind::Connect => {
            let unresolved = lower.contains("dns")
                || lower.contains("resolve")
                || lower.contains("lookup");
            match (unresolved, via_proxy) {
                (true, true) => NetworkError::ProxyNotFound,
                (true, false) => NetworkError::HostNotFound,
                (false, true) => NetworkError::ProxyConnectionRefused,
                (false, false) => NetworkError::ConnectionRefused,
            }
        }
        FailureKind::Body if via_proxy => NetworkError::ProxyConnectionClosed,
        FailureKind::Body => NetworkError::RemoteHostClosed,
        FailureKind::Other => NetworkError::ProtocolFailure(detail.to_string()),
    }
}

/// DER encoded peer certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    pub fn der(&self) -> &[u8] {
        &self.0
    }

    /// PEM armored form, 64 characters per line.
    pub fn to_pem(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.0);
        let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
        for chunk in encoded.as_bytes().chunks(64) {
            pem.push_str(&String::from_utf8_lossy(chunk));
            pem.push('\n');
        }
        pem.push_str("-----END CERTIFICATE-----\n");
        pem
    }
}

/// One HTTP exchange to execute.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Accept certificates that fail verification (manual trust override).
    pub accept_invalid_certs: bool,
}

/// Outcome of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// URL the reply belongs to.
    pub url: Url,
    pub status: Option<u16>,
    pub body: Vec<u8>,
    /// Absolute target of a 3xx `Location` header.
    pub redirect_target: Option<Url>,
    pub error: Option<NetworkError>,
    /// Peer certificate chain, `None` when the exchange was not TLS.
    pub peer_certificates: Option<Vec<Certificate>>,
}

impl Reply {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            status: None,
            body: Vec::new(),
            redirect_target: None,
            error: None,
            peer_certificates: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_redirect(mut self, target: Url) -> Self {
        self.redirect_target = Some(target);
        self
    }

    pub fn with_error(mut self, error: NetworkError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_certificates(mut self, chain: Vec<Certificate>) -> Self {
        self.peer_certificates = Some(chain);
        self
    }

    // TODO: honour the charset of the Content-Type header instead of assuming UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes HTTP exchanges for the protocol client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange. Failures are reported inside the [`Reply`].
    async fn execute(&self, request: TransportRequest) -> Reply;
}

/// Settings a [`ReqwestTransport`] is built from.
#[derive(Debug, Clone, Default)]
pub struct TransportSettings {
    /// PEM bundle of extra trusted CA certificates.
    pub ca_certificates: Vec<u8>,
    pub proxy: ProxySettings,
}

impl TransportSettings {
    pub fn from_store(store: &dyn ConnectionStore, handle: &str) -> Self {
        Self {
            ca_certificates: store.ca_certificates(handle),
            proxy: store.proxy(handle),
        }
    }
}

/// [`Transport`] backed by `reqwest`.
///
/// Holds two clients: the regular one and one that accepts invalid
/// certificates, used only for requests flagged with `accept_invalid_certs`.
pub struct ReqwestTransport {
    strict: Client,
    lenient: Client,
    via_proxy: bool,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, reqwest::Error> {
        let strict = Self::build_client(settings, false)?;
        let lenient = Self::build_client(settings, true)?;

        tracing::debug!(
            "HTTP transport ready (extra CA bytes: {}, proxy: {:?})",
            settings.ca_certificates.len(),
            settings.proxy.kind
        );

        Ok(Self {
            strict,
            lenient,
            via_proxy: settings.proxy.is_explicit(),
        })
    }

    fn build_client(
        settings: &TransportSettings,
        accept_invalid_certs: bool,
    ) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .tls_info(true)
            .danger_accept_invalid_certs(accept_invalid_certs);

        if !settings.ca_certificates.is_empty() {
            for cert in reqwest::Certificate::from_pem_bundle(&settings.ca_certificates)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        let proxy = &settings.proxy;
        match (proxy.kind, proxy.proxy_url()) {
            (ProxyKind::None, _) => builder = builder.no_proxy(),
            (_, Some(proxy_url)) => {
                let mut reqwest_proxy = Proxy::all(&proxy_url)?;
                if !proxy.user.is_empty() {
                    reqwest_proxy = reqwest_proxy.basic_auth(&proxy.user, &proxy.password);
                }
                builder = builder.proxy(reqwest_proxy);
            }
            (_, None) => {}
        }

        builder.build()
    }

    fn map_error(&self, error: &reqwest::Error) -> NetworkError {
        let kind = if error.is_timeout() {
            FailureKind::Timeout
        } else if error.is_connect() {
            FailureKind::Connect
        } else if error.is_body() || error.is_decode() {
            FailureKind::Body
        } else {
            FailureKind::Other
        };
        classify_failure(kind, &error_chain(error), self.via_proxy)
    }

    async fn read_response(&self, response: reqwest::Response) -> Reply {
        let url = response.url().clone();
        let status = response.status();

        let peer_certificates = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(|der| vec![Certificate::from_der(der.to_vec())]);

        let redirect_target = if status.is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| url.join(location).ok())
        } else {
            None
        };

        let mut reply = Reply::new(url).with_status(status.as_u16());
        reply.error = NetworkError::from_status(status.as_u16());
        reply.redirect_target = redirect_target;
        reply.peer_certificates = peer_certificates;

        match response.bytes().await {
            Ok(bytes) => reply.body = bytes.to_vec(),
            Err(e) => {
                if reply.error.is_none() {
                    reply.error = Some(self.map_error(&e));
                }
            }
        }
        reply
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Reply {
        let client = if request.accept_invalid_certs {
            &self.lenient
        } else {
            &self.strict
        };

        let url = request.url.clone();
        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        match builder.send().await {
            Ok(response) => self.read_response(response).await,
            Err(e) => {
                let error = self.map_error(&e);
                tracing::debug!("Request to {} failed: {}", url, error);
                Reply::new(url).with_error(error)
            }
        }
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(NetworkError::from_status(200), None);
        assert_eq!(NetworkError::from_status(201), None);
        assert_eq!(NetworkError::from_status(302), None);
        assert_eq!(
            NetworkError::from_status(401),
            Some(NetworkError::AuthenticationRequired)
        );
        assert_eq!(
            NetworkError::from_status(405),
            Some(NetworkError::ContentOperationNotPermitted)
        );
        assert_eq!(
            NetworkError::from_status(407),
            Some(NetworkError::ProxyAuthenticationRequired)
        );
        assert_eq!(
            NetworkError::from_status(418),
            Some(NetworkError::ClientError(418))
        );
        assert_eq!(
            NetworkError::from_status(503),
            Some(NetworkError::ServerError(503))
        );
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(FailureKind::Timeout, "timed out", false),
            NetworkError::Timeout
        );
        assert_eq!(
            classify_failure(FailureKind::Timeout, "timed out", true),
            NetworkError::ProxyTimeout
        );
        assert_eq!(
            classify_failure(FailureKind::Connect, "tcp connect error: refused", false),
            NetworkError::ConnectionRefused
        );
        assert_eq!(
            classify_failure(FailureKind::Connect, "tcp connect error: refused", true),
            NetworkError::ProxyConnectionRefused
        );
        assert_eq!(
            classify_failure(FailureKind::Connect, "dns error: failed to lookup address", false),
            NetworkError::HostNotFound
        );
        assert_eq!(
            classify_failure(FailureKind::Connect, "dns error", true),
            NetworkError::ProxyNotFound
        );
        assert!(matches!(
            classify_failure(FailureKind::Connect, "invalid peer certificate: UnknownIssuer", false),
            NetworkError::SslHandshakeFailed(_)
        ));
        assert_eq!(
            classify_failure(FailureKind::Body, "connection reset", true),
            NetworkError::ProxyConnectionClosed
        );
    }

    #[test]
    fn test_proxy_errors() {
        assert!(NetworkError::ProxyTimeout.is_proxy_error());
        assert!(NetworkError::ProxyAuthenticationRequired.is_proxy_error());
        assert!(!NetworkError::Timeout.is_proxy_error());
    }

    #[test]
    fn test_certificate_pem() {
        let cert = Certificate::from_der(vec![0u8; 60]);
        let pem = cert.to_pem();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
        // 60 bytes encode to 80 base64 characters, split over two lines
        assert_eq!(pem.lines().count(), 4);
    }

    #[test]
    fn test_transport_builds_with_explicit_proxy() {
        let settings = TransportSettings {
            ca_certificates: Vec::new(),
            proxy: ProxySettings {
                kind: ProxyKind::Http,
                host: "127.0.0.1".to_string(),
                port: 3128,
                user: "proxyuser".to_string(),
                password: "secret".to_string(),
            },
        };
        let transport = ReqwestTransport::new(&settings).unwrap();
        assert!(transport.via_proxy);
    }

    #[test]
    fn test_transport_rejects_garbage_ca_bundle() {
        let settings = TransportSettings {
            ca_certificates: b"-----BEGIN CERTIFICATE-----\nnot base64!\n-----END CERTIFICATE-----\n"
                .to_vec(),
            proxy: ProxySettings::default(),
        };
        assert!(ReqwestTransport::new(&settings).is_err());
    }

    #[test]
    fn test_body_text_is_lossy() {
        let url = Url::parse("https://cloud.example.com/status.php").unwrap();
        let reply = Reply::new(url).with_body(vec![b'o', b'k', 0xff]);
        assert_eq!(reply.body_text(), "ok\u{fffd}");
    }
}
