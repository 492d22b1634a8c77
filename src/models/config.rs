use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Client configuration for one config handle (`client.yaml` / `client-<handle>.yaml`)
///
/// Contains the known server connections and the proxy settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub connections: IndexMap<String, ConnectionSettings>,

    #[serde(default)]
    pub proxy: ProxySettings,
}

impl ClientConfig {
    pub fn connection(&self, name: &str) -> Option<&ConnectionSettings> {
        self.connections.get(name)
    }
}

/// A single server connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub url: String,

    #[serde(default)]
    pub user: String,

    /// PEM bundle of additionally trusted CA certificates.
    #[serde(default)]
    pub ca_certificates: String,
}

impl ConnectionSettings {
    /// Base URL with exactly one trailing slash, or `None` if unset.
    pub fn normalized_url(&self) -> Option<String> {
        normalize_base_url(&self.url)
    }
}

/// Normalize a server base URL so that relative endpoint paths can be appended.
pub fn normalize_base_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("{}/", trimmed.trim_end_matches('/')))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// Connect directly, ignoring any system proxy.
    None,
    /// Use whatever the environment configures.
    #[default]
    System,
    Http,
    Socks5,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub kind: ProxyKind,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

impl ProxySettings {
    /// Proxy URL for the explicit kinds, `None` for `none`/`system` or when no host is set.
    pub fn proxy_url(&self) -> Option<String> {
        let scheme = match self.kind {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
            ProxyKind::None | ProxyKind::System => return None,
        };
        if self.host.is_empty() {
            return None;
        }
        Some(format!("{}://{}:{}", scheme, self.host, self.port))
    }

    pub fn is_explicit(&self) -> bool {
        self.proxy_url().is_some()
    }
}
