//! The client builder capability that the decorator configures.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::ProxyAuthenticator;
use crate::routing::ProxySelector;
use crate::tls::SecurityContext;

/// An HTTP client under construction.
///
/// Implemented by adapters for concrete clients. Each setter consumes the
/// builder and returns it, like `reqwest::ClientBuilder`.
pub trait ClientBuilder: Sized {
    /// Bound on establishing a TCP connection.
    fn connect_timeout(self, timeout: Duration) -> Self;

    /// Bound on each socket read.
    fn socket_timeout(self, timeout: Duration) -> Self;

    /// Per-request proxy routing.
    fn proxy_selector(self, selector: Arc<ProxySelector>) -> Self;

    /// Answers `407` challenges from proxies.
    fn proxy_authenticator(self, authenticator: Arc<ProxyAuthenticator>) -> Self;

    /// TLS configuration for `https` targets.
    fn security_context(self, context: SecurityContext) -> Self;
}
