//! TLS material loading against real store files, and an end-to-end
//! `https` request verified with a configured truststore.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{Request, Uri};
use rcgen::CertifiedKey;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use httpclient_config::config::{HttpClientConfig, ProxyRuleConfig, StoreConfig, TlsConfig};
use httpclient_config::http::{HttpClientDecorator, HyperClientBuilder};
use httpclient_config::tls::{
    build_security_context, load_key_material, load_trust_material, KeyMaterial, TrustMaterial, TrustSource,
};

mod common;

const PASSWORD: &str = "changeit";

fn generate() -> CertifiedKey {
    rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap()
}

fn write(dir: &TempDir, name: &str, contents: &[u8]) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

fn write_pem(dir: &TempDir, name: &str, identity: &CertifiedKey, with_key: bool) -> String {
    let mut pem = identity.cert.pem();
    if with_key {
        pem.push('\n');
        pem.push_str(&identity.key_pair.serialize_pem());
    }
    write(dir, name, pem.as_bytes())
}

fn write_pkcs12(dir: &TempDir, name: &str, identity: &CertifiedKey, password: &str) -> String {
    let pfx = p12::PFX::new(
        identity.cert.der(),
        &identity.key_pair.serialize_der(),
        None,
        password,
        "client",
    )
    .unwrap();
    write(dir, name, &pfx.to_der())
}

/// A checked-in store under `tests/fixtures`.
///
/// `client-openssl3.p12` holds a `localhost` certificate and its key, written
/// by `openssl pkcs12 -export` on OpenSSL 3 (PBES2/AES-256, SHA-256 MAC).
/// `trust-keytool.p12` holds the same certificate as a trusted entry, written
/// by `keytool -importcert -storetype PKCS12`. Both use `changeit`.
fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn store(path: &str, password: &str, store_type: Option<&str>) -> StoreConfig {
    StoreConfig {
        path: Some(path.to_string()),
        password: Some(password.to_string()),
        store_type: store_type.map(str::to_string),
    }
}

fn truststore(store: StoreConfig) -> TlsConfig {
    TlsConfig {
        truststore: store,
        ..TlsConfig::default()
    }
}

fn keystore(store: StoreConfig) -> TlsConfig {
    TlsConfig {
        keystore: store,
        ..TlsConfig::default()
    }
}

#[test]
fn test_pem_truststore_replaces_platform() {
    let dir = TempDir::new().unwrap();
    let path = write_pem(&dir, "ca.pem", &generate(), false);

    let trust = load_trust_material(&truststore(store(&path, PASSWORD, None)));
    assert_eq!(trust.source(), TrustSource::Store);
    assert_eq!(trust.len(), 1);
}

#[test]
fn test_file_prefix_accepted() {
    let dir = TempDir::new().unwrap();
    let path = write_pem(&dir, "ca.pem", &generate(), false);

    let trust = load_trust_material(&truststore(store(&format!("file:{}", path), PASSWORD, Some("PEM"))));
    assert_eq!(trust.source(), TrustSource::Store);
}

#[test]
fn test_pkcs12_truststore() {
    let dir = TempDir::new().unwrap();
    let path = write_pkcs12(&dir, "trust.p12", &generate(), PASSWORD);

    let trust = load_trust_material(&truststore(store(&path, PASSWORD, Some("PKCS12"))));
    assert_eq!(trust.source(), TrustSource::Store);
    assert_eq!(trust.len(), 1);
}

#[test]
fn test_truststore_wrong_password_keeps_platform() {
    let dir = TempDir::new().unwrap();
    let path = write_pkcs12(&dir, "trust.p12", &generate(), PASSWORD);

    let trust = load_trust_material(&truststore(store(&path, "wrong", Some("PKCS12"))));
    assert!(trust.is_platform());
    assert_eq!(trust.len(), TrustMaterial::platform().len());
}

#[test]
fn test_truststore_corrupt_file_keeps_platform() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "trust.p12", b"\x30\x03garbage");

    let trust = load_trust_material(&truststore(store(&path, PASSWORD, Some("PKCS12"))));
    assert!(trust.is_platform());
}

#[test]
fn test_truststore_without_certificates_keeps_platform() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "empty.pem", b"# nothing here\n");

    assert!(load_trust_material(&truststore(store(&path, PASSWORD, None))).is_platform());
}

#[test]
fn test_aes_sha256_truststore() {
    let path = fixture("trust-keytool.p12");

    let trust = load_trust_material(&truststore(store(&path, PASSWORD, Some("PKCS12"))));
    assert_eq!(trust.source(), TrustSource::Store);
    assert_eq!(trust.len(), 1);
}

#[test]
fn test_aes_sha256_truststore_wrong_password_keeps_platform() {
    let path = fixture("trust-keytool.p12");

    let trust = load_trust_material(&truststore(store(&path, "wrong", Some("PKCS12"))));
    assert!(trust.is_platform());
    assert_eq!(trust.len(), TrustMaterial::platform().len());
}

#[test]
fn test_aes_sha256_keystore() {
    let path = fixture("client-openssl3.p12");
    let config = keystore(store(&path, PASSWORD, Some("PKCS12")));

    let key = load_key_material(&config).unwrap();
    assert_eq!(key.chain().len(), 1);
    assert!(matches!(key.key(), PrivateKeyDer::Pkcs8(_)));

    let context = build_security_context(&config, Some(key), &TrustMaterial::platform()).unwrap();
    assert!(context.has_client_auth());
}

#[test]
fn test_aes_sha256_keystore_wrong_password_is_none() {
    let path = fixture("client-openssl3.p12");

    assert!(load_key_material(&keystore(store(&path, "wrong", None))).is_none());
}

#[test]
fn test_aes_sha256_stores_through_decorator() {
    let config = HttpClientConfig {
        tls: TlsConfig {
            protocol_name: "TLS".into(),
            keystore: store(&fixture("client-openssl3.p12"), "wrong", None),
            truststore: store(&fixture("trust-keytool.p12"), "wrong", Some("PKCS12")),
        },
        ..HttpClientConfig::default()
    };

    // Unreadable stores degrade to defaults; building the client still succeeds.
    let _client = HttpClientDecorator::new(&config)
        .unwrap()
        .decorate(HyperClientBuilder::new())
        .build::<Empty<Bytes>>();
}

#[test]
fn test_pkcs12_keystore() {
    let dir = TempDir::new().unwrap();
    let path = write_pkcs12(&dir, "client.p12", &generate(), PASSWORD);

    let key = load_key_material(&keystore(store(&path, PASSWORD, None))).unwrap();
    assert_eq!(key.chain().len(), 1);
    assert!(matches!(key.key(), PrivateKeyDer::Pkcs8(_)));
}

#[test]
fn test_pem_keystore() {
    let dir = TempDir::new().unwrap();
    let path = write_pem(&dir, "client.pem", &generate(), true);

    let key = load_key_material(&keystore(store(&path, PASSWORD, Some("PEM")))).unwrap();
    assert_eq!(key.chain().len(), 1);
}

#[test]
fn test_keystore_failures_yield_none() {
    let dir = TempDir::new().unwrap();
    let identity = generate();
    let p12 = write_pkcs12(&dir, "client.p12", &identity, PASSWORD);
    let cert_only = write_pem(&dir, "cert.pem", &identity, false);

    // wrong password
    assert!(load_key_material(&keystore(store(&p12, "wrong", None))).is_none());
    // type names are case-sensitive
    assert!(load_key_material(&keystore(store(&p12, PASSWORD, Some("pkcs12")))).is_none());
    // PEM without a private key
    assert!(load_key_material(&keystore(store(&cert_only, PASSWORD, Some("PEM")))).is_none());
    // blank password
    assert!(load_key_material(&keystore(store(&p12, "", None))).is_none());
}

#[test]
fn test_context_with_client_certificate() {
    let dir = TempDir::new().unwrap();
    let identity = generate();
    let p12 = write_pkcs12(&dir, "client.p12", &identity, PASSWORD);
    let ca = write_pem(&dir, "ca.pem", &identity, false);

    let config = TlsConfig {
        protocol_name: "TLSv1.3".into(),
        keystore: store(&p12, PASSWORD, None),
        truststore: store(&ca, PASSWORD, None),
    };

    let trust = load_trust_material(&config);
    let key = load_key_material(&config);
    let context = build_security_context(&config, key, &trust).unwrap();
    assert!(context.has_client_auth());
}

#[test]
fn test_unknown_protocol_with_material_is_none() {
    let dir = TempDir::new().unwrap();
    let p12 = write_pkcs12(&dir, "client.p12", &generate(), PASSWORD);

    let mut config = keystore(store(&p12, PASSWORD, None));
    config.protocol_name = "SSLv3".into();

    let key = load_key_material(&config);
    assert!(key.is_some());
    assert!(build_security_context(&config, key, &load_trust_material(&config)).is_none());
}

/// Start an HTTPS server for `localhost` answering with `body`.
async fn start_tls_backend(identity: &CertifiedKey, body: &'static str) -> u16 {
    serve_tls(
        KeyMaterial::new(
            vec![CertificateDer::from(identity.cert.der().to_vec())],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key_pair.serialize_der())),
        ),
        body,
    )
    .await
}

async fn serve_tls(identity: KeyMaterial, body: &'static str) -> u16 {
    let (chain, key) = identity.into_parts();
    let server_config = rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut stream) = acceptor.accept(socket).await {
                    common::respond(&mut stream, body).await;
                }
            });
        }
    });

    port
}

fn https_config(ca: &Path, proxies: Vec<ProxyRuleConfig>) -> HttpClientConfig {
    with_truststore(store(&ca.to_string_lossy(), PASSWORD, None), proxies)
}

fn with_truststore(truststore: StoreConfig, proxies: Vec<ProxyRuleConfig>) -> HttpClientConfig {
    HttpClientConfig {
        tls: TlsConfig {
            protocol_name: "TLS".into(),
            truststore,
            ..TlsConfig::default()
        },
        proxies,
        ..HttpClientConfig::default()
    }
}

async fn fetch(config: &HttpClientConfig, port: u16) -> Result<String, hyper_util::client::legacy::Error> {
    let client = HttpClientDecorator::new(config)
        .unwrap()
        .decorate(HyperClientBuilder::new())
        .build::<Empty<Bytes>>();

    let uri: Uri = format!("https://localhost:{}/", port).parse().unwrap();
    let response = client.request(Request::get(uri).body(Empty::new()).unwrap()).await?;
    let body = response.into_body().collect().await.unwrap().to_bytes();
    Ok(String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_https_with_configured_truststore() {
    let dir = TempDir::new().unwrap();
    let identity = generate();
    let ca = write_pem(&dir, "ca.pem", &identity, false);
    let port = start_tls_backend(&identity, "secure").await;

    let body = fetch(&https_config(Path::new(&ca), vec![]), port).await.unwrap();
    assert_eq!(body, "secure");
}

#[tokio::test]
async fn test_https_with_keytool_truststore() {
    let server = load_key_material(&keystore(store(&fixture("client-openssl3.p12"), PASSWORD, None))).unwrap();
    let port = serve_tls(server, "keytool").await;

    let config = with_truststore(store(&fixture("trust-keytool.p12"), PASSWORD, Some("PKCS12")), vec![]);
    let body = fetch(&config, port).await.unwrap();
    assert_eq!(body, "keytool");
}

#[tokio::test]
async fn test_https_untrusted_server_rejected() {
    let dir = TempDir::new().unwrap();
    let other = write_pem(&dir, "other.pem", &generate(), false);
    let port = start_tls_backend(&generate(), "secure").await;

    assert!(fetch(&https_config(Path::new(&other), vec![]), port).await.is_err());
}

#[tokio::test]
async fn test_https_through_tunnel() {
    let dir = TempDir::new().unwrap();
    let identity = generate();
    let ca = write_pem(&dir, "ca.pem", &identity, false);
    let port = start_tls_backend(&identity, "tunnelled").await;
    let (proxy, log) = common::start_scripted_proxy(common::ProxyBehavior::Open).await;

    let rule = ProxyRuleConfig {
        host_patterns: vec!["localhost".into()],
        proxy_host: proxy.ip().to_string(),
        proxy_port: proxy.port(),
        proxy_user: None,
        proxy_password: None,
    };

    let body = fetch(&https_config(Path::new(&ca), vec![rule]), port).await.unwrap();
    assert_eq!(body, "tunnelled");
    assert_eq!(log.attempts().len(), 1);
}
