//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the HTTP client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Default proxy port when a rule does not name one.
pub const DEFAULT_PROXY_PORT: u16 = 3128;

/// Default store type for the client keystore.
pub const DEFAULT_KEYSTORE_TYPE: &str = "PKCS12";

/// Default store type for the truststore.
pub const DEFAULT_TRUSTSTORE_TYPE: &str = "PEM";

/// Default security-context protocol.
pub const DEFAULT_SSL_CONTEXT: &str = "TLSv1.2";

/// Root configuration for the HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Protocol and key/trust store settings.
    #[serde(flatten)]
    pub tls: TlsConfig,

    /// Proxy rules, in priority order.
    pub proxies: Vec<ProxyRuleConfig>,
}

/// Timeout configuration, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout.
    #[serde(rename = "connection_timeout")]
    pub connection_timeout_ms: u64,

    /// Socket read timeout.
    #[serde(rename = "socket_timeout")]
    pub socket_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 5000,
            socket_timeout_ms: 10000,
        }
    }
}

/// TLS configuration for outgoing connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Security-context protocol name (e.g. "TLSv1.2").
    #[serde(rename = "ssl_context")]
    pub protocol_name: String,

    /// Client certificate store.
    pub keystore: StoreConfig,

    /// Trust anchor store.
    pub truststore: StoreConfig,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            protocol_name: DEFAULT_SSL_CONTEXT.to_string(),
            keystore: StoreConfig::default(),
            truststore: StoreConfig::default(),
        }
    }
}

impl TlsConfig {
    /// Store type of the keystore, falling back to `PKCS12`.
    pub fn keystore_type(&self) -> &str {
        self.keystore.store_type.as_deref().unwrap_or(DEFAULT_KEYSTORE_TYPE)
    }

    /// Store type of the truststore, falling back to `PEM`.
    pub fn truststore_type(&self) -> &str {
        self.truststore.store_type.as_deref().unwrap_or(DEFAULT_TRUSTSTORE_TYPE)
    }
}

/// Location and password of a key or trust store.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the store file. A leading `file:` is accepted.
    pub path: Option<String>,

    /// Store password.
    pub password: Option<String>,

    /// Store type name (case-sensitive). Unset means the role's default.
    #[serde(rename = "type")]
    pub store_type: Option<String>,
}

impl StoreConfig {
    /// Path and password, if both are non-blank.
    ///
    /// A partially specified store is treated as absent.
    pub fn location(&self) -> Option<(&str, &str)> {
        match (non_blank(self.path.as_deref()), non_blank(self.password.as_deref())) {
            (Some(path), Some(password)) => Some((path, password)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("store_type", &self.store_type)
            .finish()
    }
}

/// A proxy rule: which hosts it applies to and where to send them.
#[derive(Clone, Deserialize, Serialize)]
pub struct ProxyRuleConfig {
    /// Regular expressions matched against the whole target host.
    /// Empty means every host.
    #[serde(default)]
    pub host_patterns: Vec<String>,

    /// Upstream proxy host.
    pub proxy_host: String,

    /// Upstream proxy port (default: 3128).
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,

    /// Optional proxy user.
    #[serde(default)]
    pub proxy_user: Option<String>,

    /// Optional proxy password.
    #[serde(default)]
    pub proxy_password: Option<String>,
}

fn default_proxy_port() -> u16 {
    DEFAULT_PROXY_PORT
}

impl std::fmt::Debug for ProxyRuleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRuleConfig")
            .field("host_patterns", &self.host_patterns)
            .field("proxy_host", &self.proxy_host)
            .field("proxy_port", &self.proxy_port)
            .field("proxy_user", &self.proxy_user)
            .field("proxy_password", &self.proxy_password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Returns the value if it contains anything besides whitespace.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
