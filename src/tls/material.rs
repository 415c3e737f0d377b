//! Trust and key material loading.
//!
//! Both loaders are fail-open. Trust loading always yields a usable root
//! set; key loading yields `None` when no client certificate can be used.

use std::fmt;
use std::sync::{Arc, OnceLock};

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;

use crate::config::schema::{StoreConfig, TlsConfig};
use crate::tls::store::{self, StoreError, StoreType};

/// Where a trust set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustSource {
    /// Operating system anchors (or bundled roots if the OS has none).
    Platform,
    /// The configured truststore.
    Store,
}

/// The certificates a client trusts when verifying servers.
#[derive(Clone)]
pub struct TrustMaterial {
    roots: Arc<RootCertStore>,
    source: TrustSource,
}

impl TrustMaterial {
    /// The process-wide platform trust set.
    pub fn platform() -> Self {
        static PLATFORM_ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

        let roots = PLATFORM_ROOTS.get_or_init(|| Arc::new(platform_roots())).clone();
        Self {
            roots,
            source: TrustSource::Platform,
        }
    }

    fn from_store(roots: RootCertStore) -> Self {
        Self {
            roots: Arc::new(roots),
            source: TrustSource::Store,
        }
    }

    pub fn roots(&self) -> Arc<RootCertStore> {
        self.roots.clone()
    }

    pub fn source(&self) -> TrustSource {
        self.source
    }

    pub fn is_platform(&self) -> bool {
        self.source == TrustSource::Platform
    }

    /// Number of trust anchors.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl fmt::Debug for TrustMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustMaterial")
            .field("source", &self.source)
            .field("anchors", &self.roots.len())
            .finish()
    }
}

fn platform_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::debug!(error = %error, "Skipping unreadable platform certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);

    if roots.is_empty() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        tracing::debug!(anchors = roots.len(), "No platform trust anchors, using bundled roots");
    } else {
        tracing::debug!(added, ignored, "Loaded platform trust anchors");
    }

    roots
}

/// A client certificate chain and its private key.
pub struct KeyMaterial {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl KeyMaterial {
    pub fn new(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { chain, key }
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    pub fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.chain, self.key)
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("chain", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Load the trust set to verify servers with.
///
/// Starts from the platform set. A configured truststore replaces it; if
/// the store cannot be read or yields no usable anchor, the platform set
/// stays.
pub fn load_trust_material(config: &TlsConfig) -> TrustMaterial {
    let default = TrustMaterial::platform();

    let Some((path, password)) = configured(&config.truststore, "Truststore") else {
        return default;
    };

    match read_trust_store(config.truststore_type(), path, password) {
        Ok(roots) => {
            tracing::debug!(path = %path, anchors = roots.len(), "Loaded truststore");
            TrustMaterial::from_store(roots)
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Failed to load truststore, using platform defaults");
            default
        }
    }
}

fn read_trust_store(store_type: &str, path: &str, password: &str) -> Result<RootCertStore, StoreError> {
    let store_type: StoreType = store_type.parse()?;
    let contents = store::open(store_type, path, password)?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(contents.certificates);
    if ignored > 0 {
        tracing::warn!(path = %path, ignored, "Truststore has unusable certificates");
    }
    if added == 0 {
        return Err(StoreError::NoCertificates);
    }
    Ok(roots)
}

/// Load the client certificate and key, if a keystore is configured and
/// readable.
pub fn load_key_material(config: &TlsConfig) -> Option<KeyMaterial> {
    let (path, password) = configured(&config.keystore, "Keystore")?;

    match read_key_store(config.keystore_type(), path, password) {
        Ok(material) => {
            tracing::debug!(path = %path, chain = material.chain.len(), "Loaded keystore");
            Some(material)
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Failed to load keystore, no client certificate");
            None
        }
    }
}

fn read_key_store(store_type: &str, path: &str, password: &str) -> Result<KeyMaterial, StoreError> {
    let store_type: StoreType = store_type.parse()?;
    let contents = store::open(store_type, path, password)?;

    let (chain, key) = contents.identity.ok_or(StoreError::NoPrivateKey)?;
    if chain.is_empty() {
        return Err(StoreError::NoCertificates);
    }

    Ok(KeyMaterial::new(chain, key))
}

/// Path and password of a store, or `None` (logged at warn) if either is
/// missing or blank.
fn configured<'a>(store: &'a StoreConfig, role: &str) -> Option<(&'a str, &'a str)> {
    let location = store.location();
    if location.is_none() {
        tracing::warn!(
            store = role,
            has_path = store.path.is_some(),
            has_password = store.password.is_some(),
            "{} configuration incomplete, skipping",
            role
        );
    }
    location
}
