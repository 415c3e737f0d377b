//! hyper adapter: a legacy `Client` over [`ProxyConnector`].
//!
//! Unlike reqwest, this client follows the whole route chain and answers
//! `407` challenges through the authenticator.

use std::sync::Arc;
use std::time::Duration;

use hyper::body::Body;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::auth::ProxyAuthenticator;
use crate::http::builder::ClientBuilder;
use crate::http::connector::ProxyConnector;
use crate::routing::ProxySelector;
use crate::tls::{self, SecurityContext};

/// Collects settings for a hyper client.
#[derive(Debug, Default, Clone)]
pub struct HyperClientBuilder {
    selector: Option<Arc<ProxySelector>>,
    authenticator: Option<Arc<ProxyAuthenticator>>,
    context: Option<SecurityContext>,
    connect_timeout: Option<Duration>,
    socket_timeout: Option<Duration>,
}

impl HyperClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connector these settings describe. Without a security context,
    /// `https` targets use platform trust.
    pub fn connector(&self) -> ProxyConnector {
        let context = self.context.clone().or_else(tls::default_security_context);

        ProxyConnector::new(
            self.selector.clone(),
            self.authenticator.clone(),
            context.map(|c| c.connector()),
            self.connect_timeout,
            self.socket_timeout,
        )
    }

    pub fn build<B>(self) -> Client<ProxyConnector, B>
    where
        B: Body + Send,
        B::Data: Send,
    {
        Client::builder(TokioExecutor::new()).build(self.connector())
    }
}

impl ClientBuilder for HyperClientBuilder {
    fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
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
        self.context = Some(context);
        self
    }
}
