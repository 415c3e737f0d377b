//! Applies the configured policy to a client builder.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::ProxyAuthenticator;
use crate::config::schema::{HttpClientConfig, TimeoutConfig, TlsConfig};
use crate::http::builder::ClientBuilder;
use crate::routing::{HostRule, ProxySelector};
use crate::tls;

/// Decorates client builders with timeouts, TLS and proxy routing.
///
/// Rules are compiled and the credential table is built once, at
/// construction. The same decorator can configure any number of builders,
/// of any client type.
#[derive(Debug, Clone)]
pub struct HttpClientDecorator {
    timeouts: TimeoutConfig,
    tls: TlsConfig,
    selector: Option<Arc<ProxySelector>>,
    authenticator: Option<Arc<ProxyAuthenticator>>,
}

impl HttpClientDecorator {
    /// Compile the proxy rules of `config`.
    ///
    /// Fails only on a host pattern that is not a valid regular expression,
    /// which validation at load time already rejects.
    pub fn new(config: &HttpClientConfig) -> Result<Self, regex::Error> {
        let rules = HostRule::compile_all(&config.proxies)?;
        Ok(Self::from_rules(config.timeouts, config.tls.clone(), rules))
    }

    /// Build from already compiled rules.
    pub fn from_rules(timeouts: TimeoutConfig, tls: TlsConfig, rules: Vec<HostRule>) -> Self {
        let (selector, authenticator) = if rules.is_empty() {
            (None, None)
        } else {
            let authenticator = ProxyAuthenticator::new(&rules);
            let authenticator = (!authenticator.is_empty()).then(|| Arc::new(authenticator));
            (Some(Arc::new(ProxySelector::new(rules))), authenticator)
        };

        Self {
            timeouts,
            tls,
            selector,
            authenticator,
        }
    }

    pub fn selector(&self) -> Option<&Arc<ProxySelector>> {
        self.selector.as_ref()
    }

    pub fn authenticator(&self) -> Option<&Arc<ProxyAuthenticator>> {
        self.authenticator.as_ref()
    }

    /// Configure `builder`. Never fails: TLS problems are logged and the
    /// builder keeps its default TLS setup.
    pub fn decorate<B: ClientBuilder>(&self, builder: B) -> B {
        let mut builder = builder
            .connect_timeout(Duration::from_millis(self.timeouts.connection_timeout_ms))
            .socket_timeout(Duration::from_millis(self.timeouts.socket_timeout_ms));

        let trust = tls::load_trust_material(&self.tls);
        let key = tls::load_key_material(&self.tls);
        match tls::build_security_context(&self.tls, key, &trust) {
            Some(context) => builder = builder.security_context(context),
            None => tracing::warn!(protocol = %self.tls.protocol_name, "Invalid security context, skipping"),
        }

        if let Some(selector) = &self.selector {
            tracing::debug!(rules = selector.rules().len(), "Configuring proxy routing");
            builder = builder.proxy_selector(selector.clone());

            if let Some(authenticator) = &self.authenticator {
                tracing::debug!(proxies = authenticator.len(), "Configuring proxy authentication");
                builder = builder.proxy_authenticator(authenticator.clone());
            }
        }

        builder
    }
}
