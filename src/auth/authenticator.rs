//! Proxy authentication.
//!
//! Answers `407 Proxy Authentication Required` challenges with HTTP basic
//! credentials taken from the proxy rules. A request that already carried
//! credentials is never retried, so a proxy that rejects them fails once
//! instead of looping.

use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::header::HeaderValue;

use crate::routing::rule::HostRule;
use crate::routing::selector::ProxyEndpoint;

/// A basic-auth credential for one proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    user: String,
    password: String,
}

impl ProxyCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `Basic base64(user:password)`, UTF-8 encoded.
    pub fn basic(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.user, self.password));
        format!("Basic {}", token)
    }

    /// The `Proxy-Authorization` header value, marked sensitive.
    pub fn header_value(&self) -> HeaderValue {
        // base64 output is always a valid header value
        let mut value = HeaderValue::from_str(&self.basic()).unwrap_or_else(|_| HeaderValue::from_static("Basic"));
        value.set_sensitive(true);
        value
    }
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Credential lookup keyed by proxy endpoint. Immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct ProxyAuthenticator {
    credentials: HashMap<ProxyEndpoint, ProxyCredentials>,
}

impl ProxyAuthenticator {
    /// Index every rule that has a proxy host and both user and password.
    ///
    /// When two rules resolve to the same endpoint the later one wins.
    pub fn new(rules: &[HostRule]) -> Self {
        let mut credentials = HashMap::new();

        for rule in rules {
            let (Some(endpoint), Some((user, password))) = (rule.endpoint(), rule.credentials()) else {
                continue;
            };

            let entry = ProxyCredentials::new(user, password);
            if let Some(previous) = credentials.insert(endpoint.clone(), entry) {
                tracing::warn!(
                    proxy = %endpoint,
                    previous_user = %previous.user(),
                    user = %user,
                    "Duplicate credentials for proxy, later rule wins"
                );
            }
        }

        Self { credentials }
    }

    /// True if no rule carries credentials.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Credentials to retry a challenged request with.
    ///
    /// Returns `None` if the challenged request already carried a
    /// `Proxy-Authorization` header, or if `proxy` has no credentials.
    pub fn authenticate(&self, proxy: &ProxyEndpoint, prior_attempt_had_auth: bool) -> Option<ProxyCredentials> {
        if self.credentials.is_empty() {
            return None;
        }

        if prior_attempt_had_auth {
            tracing::debug!(proxy = %proxy, "Proxy rejected credentials, not retrying");
            return None;
        }

        let found = self.credentials.get(proxy).cloned();
        if found.is_none() {
            tracing::debug!(proxy = %proxy, "No credentials configured for proxy");
        }
        found
    }
}
