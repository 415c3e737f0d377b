//! Key and trust store files.
//!
//! Two store formats are understood, selected by exact type name:
//! `PKCS12` (DER archive, password-protected) and `PEM` (plain text, the
//! password is only required to be present).
//!
//! PKCS12 archives are read in both the legacy layout (3DES/RC2 bags,
//! SHA-1 MAC) and the current one written by OpenSSL 3 and `keytool`
//! (PBES2/AES-256 bags, SHA-256 MAC).

use std::fmt;
use std::io::BufReader;
use std::path::PathBuf;
use std::str::FromStr;

use p12_keystore::error::Error as Pkcs12Error;
use p12_keystore::{KeyStore, KeyStoreEntry};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use thiserror::Error;

/// Errors raised while reading a store.
///
/// These never leave the `tls` module: the loaders log them and fall back.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported store type '{0}'")]
    UnsupportedType(String),

    #[error("failed to read store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed PKCS12 archive: {0}")]
    Pkcs12(String),

    #[error("store password rejected")]
    BadPassword,

    #[error("malformed PEM store: {0}")]
    Pem(#[source] std::io::Error),

    #[error("store contains no certificates")]
    NoCertificates,

    #[error("store contains no private key")]
    NoPrivateKey,
}

/// Supported store formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Pkcs12,
    Pem,
}

impl FromStr for StoreType {
    type Err = StoreError;

    /// Case-sensitive: `pkcs12` is not `PKCS12`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PKCS12" => Ok(StoreType::Pkcs12),
            "PEM" => Ok(StoreType::Pem),
            other => Err(StoreError::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreType::Pkcs12 => write!(f, "PKCS12"),
            StoreType::Pem => write!(f, "PEM"),
        }
    }
}

/// An opened store.
pub struct StoreContents {
    /// Certificates usable as trust anchors.
    pub certificates: Vec<CertificateDer<'static>>,
    /// The first private key with its certificate chain, leaf first.
    pub identity: Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>,
}

impl fmt::Debug for StoreContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContents")
            .field("certificates", &self.certificates.len())
            .field("identity", &self.identity.as_ref().map(|(chain, _)| chain.len()))
            .finish()
    }
}

/// Resolve a configured path, accepting a leading `file:`.
pub fn resolve_path(path: &str) -> PathBuf {
    let path = path.trim();
    PathBuf::from(path.strip_prefix("file:").unwrap_or(path))
}

/// Open and decode a store.
pub fn open(store_type: StoreType, path: &str, password: &str) -> Result<StoreContents, StoreError> {
    let path = resolve_path(path);
    let bytes = std::fs::read(&path).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), store_type = %store_type, "Opening store");

    match store_type {
        StoreType::Pkcs12 => decode_pkcs12(&bytes, password),
        StoreType::Pem => decode_pem(&bytes),
    }
}

fn decode_pkcs12(bytes: &[u8], password: &str) -> Result<StoreContents, StoreError> {
    let keystore = KeyStore::from_pkcs12(bytes, password).map_err(|e| match e {
        Pkcs12Error::MacError(_) => StoreError::BadPassword,
        other => StoreError::Pkcs12(other.to_string()),
    })?;

    let mut certificates = Vec::new();
    let mut identity = None;

    for (alias, entry) in keystore.entries() {
        match entry {
            KeyStoreEntry::Certificate(cert) => {
                certificates.push(CertificateDer::from(cert.as_der().to_vec()));
            }
            KeyStoreEntry::PrivateKeyChain(key_chain) => {
                let chain: Vec<CertificateDer<'static>> = key_chain
                    .chain()
                    .iter()
                    .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
                    .collect();

                // A key entry's own certificate is trusted as well.
                certificates.extend(chain.first().cloned());

                if identity.is_some() {
                    tracing::debug!(alias = %alias, "Ignoring additional private key entry");
                    continue;
                }
                let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_chain.key().to_vec()));
                identity = Some((chain, key));
            }
        }
    }

    Ok(StoreContents {
        certificates,
        identity,
    })
}

fn decode_pem(bytes: &[u8]) -> Result<StoreContents, StoreError> {
    let certificates = rustls_pemfile::certs(&mut BufReader::new(bytes))
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::Pem)?;

    let private_key = rustls_pemfile::private_key(&mut BufReader::new(bytes)).map_err(StoreError::Pem)?;
    let identity = private_key.map(|key| (certificates.clone(), key));

    Ok(StoreContents {
        certificates,
        identity,
    })
}
