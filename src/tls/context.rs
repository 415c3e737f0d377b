//! Security context assembly.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustls::version::{TLS12, TLS13};
use rustls::{ClientConfig, SupportedProtocolVersion};

use crate::config::schema::TlsConfig;
use crate::tls::material::{KeyMaterial, TrustMaterial};

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&TLS12];
static TLS13_AND_BELOW: &[&SupportedProtocolVersion] = &[&TLS13, &TLS12];

/// Protocol names accepted for the security context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProtocol {
    /// `TLS`: every version the provider supports.
    Tls,
    /// `TLSv1.2`: TLS 1.2 only.
    Tls12,
    /// `TLSv1.3`: TLS 1.3, with 1.2 as fallback.
    Tls13,
}

impl TlsProtocol {
    pub fn versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            TlsProtocol::Tls12 => TLS12_ONLY,
            TlsProtocol::Tls | TlsProtocol::Tls13 => TLS13_AND_BELOW,
        }
    }
}

impl FromStr for TlsProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TLS" => Ok(TlsProtocol::Tls),
            "TLSv1.2" => Ok(TlsProtocol::Tls12),
            "TLSv1.3" => Ok(TlsProtocol::Tls13),
            other => Err(format!("unsupported protocol '{}'", other)),
        }
    }
}

impl fmt::Display for TlsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TlsProtocol::Tls => "TLS",
            TlsProtocol::Tls12 => "TLSv1.2",
            TlsProtocol::Tls13 => "TLSv1.3",
        };
        write!(f, "{}", name)
    }
}

/// An assembled TLS client configuration.
#[derive(Clone)]
pub struct SecurityContext {
    protocol: TlsProtocol,
    client_auth: bool,
    config: Arc<ClientConfig>,
}

impl SecurityContext {
    pub fn protocol(&self) -> TlsProtocol {
        self.protocol
    }

    /// True if a client certificate is presented.
    pub fn has_client_auth(&self) -> bool {
        self.client_auth
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.config.clone()
    }

    pub fn connector(&self) -> tokio_rustls::TlsConnector {
        tokio_rustls::TlsConnector::from(self.config.clone())
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("protocol", &self.protocol)
            .field("client_auth", &self.client_auth)
            .finish_non_exhaustive()
    }
}

/// Build a context for `config.protocol_name` from the loaded material.
///
/// Returns `None` (logged) for an unknown protocol or when the material is
/// rejected, e.g. a key that does not fit its certificate.
pub fn build_security_context(
    config: &TlsConfig,
    key: Option<KeyMaterial>,
    trust: &TrustMaterial,
) -> Option<SecurityContext> {
    let protocol: TlsProtocol = match config.protocol_name.parse() {
        Ok(protocol) => protocol,
        Err(e) => {
            tracing::error!(protocol = %config.protocol_name, error = %e, "Cannot create security context");
            return None;
        }
    };

    match assemble(protocol, key, trust) {
        Ok(context) => {
            tracing::debug!(
                protocol = %protocol,
                client_auth = context.client_auth,
                trust = ?trust.source(),
                "Security context ready"
            );
            Some(context)
        }
        Err(e) => {
            tracing::error!(protocol = %protocol, error = %e, "Cannot initialize security context");
            None
        }
    }
}

fn assemble(
    protocol: TlsProtocol,
    key: Option<KeyMaterial>,
    trust: &TrustMaterial,
) -> Result<SecurityContext, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(protocol.versions())?
        .with_root_certificates(trust.roots());

    let client_auth = key.is_some();
    let config = match key {
        Some(material) => {
            let (chain, key) = material.into_parts();
            builder.with_client_auth_cert(chain, key)?
        }
        None => builder.with_no_client_auth(),
    };

    Ok(SecurityContext {
        protocol,
        client_auth,
        config: Arc::new(config),
    })
}

/// A context with platform trust, every supported version and no client
/// certificate.
pub fn default_security_context() -> Option<SecurityContext> {
    match assemble(TlsProtocol::Tls, None, &TrustMaterial::platform()) {
        Ok(context) => Some(context),
        Err(e) => {
            tracing::error!(error = %e, "Cannot initialize default security context");
            None
        }
    }
}
