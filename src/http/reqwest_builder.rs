//! `reqwest` adapter.
//!
//! reqwest takes one proxy per request and has no hook for `407`
//! challenges, so routing uses the first route of the selector's chain and
//! configured credentials are sent up front on every proxied request.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::auth::ProxyAuthenticator;
use crate::http::builder::ClientBuilder;
use crate::routing::{ProxySelector, Route};
use crate::tls::SecurityContext;

/// A `reqwest::ClientBuilder` that can be decorated.
pub struct ReqwestClientBuilder {
    inner: reqwest::ClientBuilder,
    selector: Option<Arc<ProxySelector>>,
    authenticator: Option<Arc<ProxyAuthenticator>>,
}

impl ReqwestClientBuilder {
    pub fn new() -> Self {
        Self::from_builder(reqwest::Client::builder())
    }

    /// Wrap an existing builder, keeping its settings.
    pub fn from_builder(inner: reqwest::ClientBuilder) -> Self {
        Self {
            inner,
            selector: None,
            authenticator: None,
        }
    }

    /// Finish configuration and build the client.
    pub fn build(self) -> reqwest::Result<reqwest::Client> {
        let mut inner = self.inner;

        if let Some(selector) = self.selector {
            let authenticator = self.authenticator;
            inner = inner.proxy(reqwest::Proxy::custom(move |url| {
                proxy_url(&selector, authenticator.as_deref(), url)
            }));
        }

        inner.build()
    }
}

impl Default for ReqwestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder for ReqwestClientBuilder {
    fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.connect_timeout(timeout);
        self
    }

    fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.read_timeout(timeout);
        self
    }

    fn proxy_selector(mut self, selector: Arc<ProxySelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    fn proxy_authenticator(mut self, authenticator: Arc<ProxyAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    fn security_context(mut self, context: SecurityContext) -> Self {
        let config = (*context.client_config()).clone();
        self.inner = self.inner.use_preconfigured_tls(config);
        self
    }
}

/// The proxy URL for a request, with credentials as userinfo when the
/// proxy has them. `None` means connect directly.
pub fn proxy_url(selector: &ProxySelector, authenticator: Option<&ProxyAuthenticator>, target: &Url) -> Option<Url> {
    let routes = selector.select_url(target);
    let endpoint = match routes.first() {
        Some(Route::Proxy(endpoint)) => endpoint,
        _ => return None,
    };

    let mut url = match Url::parse(&format!("http://{}", endpoint.authority())) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(proxy = %endpoint, error = %e, "Unusable proxy address, connecting directly");
            return None;
        }
    };

    if let Some(credentials) = authenticator.and_then(|a| a.authenticate(endpoint, false)) {
        if url.set_username(credentials.user()).is_err() || url.set_password(Some(credentials.password())).is_err() {
            tracing::warn!(proxy = %endpoint, "Cannot attach proxy credentials");
        }
    }

    Some(url)
}
