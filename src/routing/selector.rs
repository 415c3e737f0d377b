//! Per-request proxy selection.
//!
//! # Responsibilities
//! - Turn a target URI into an ordered list of routes
//! - Guarantee at least one route (`Route::Direct` when nothing applies)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Every matching rule contributes, so the result is a fallback chain
//! - Rules with a blank proxy host are skipped, never emitted
//! - No I/O: selection is a pure lookup over precompiled rules

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hyper::Uri;

use crate::routing::matcher;
use crate::routing::rule::HostRule;

/// Address of an upstream HTTP proxy.
///
/// Host names compare case-insensitively.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    host: String,
    port: u16,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl PartialEq for ProxyEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.port == other.port && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl Eq for ProxyEndpoint {}

impl Hash for ProxyEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.host.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        self.port.hash(state);
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

/// One routing decision for an outgoing connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Connect straight to the target.
    Direct,
    /// Tunnel through an HTTP proxy.
    Proxy(ProxyEndpoint),
}

impl Route {
    /// The "no proxy" sentinel.
    pub const NO_PROXY: Route = Route::Direct;

    pub fn is_direct(&self) -> bool {
        matches!(self, Route::Direct)
    }

    pub fn endpoint(&self) -> Option<&ProxyEndpoint> {
        match self {
            Route::Direct => None,
            Route::Proxy(endpoint) => Some(endpoint),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => write!(f, "DIRECT"),
            Route::Proxy(endpoint) => write!(f, "HTTP @ {}", endpoint),
        }
    }
}

/// Chooses proxies for outgoing requests from a fixed rule set.
#[derive(Debug, Clone)]
pub struct ProxySelector {
    rules: Arc<[HostRule]>,
}

impl ProxySelector {
    /// Create a selector over the given rules, in priority order.
    pub fn new(rules: impl Into<Arc<[HostRule]>>) -> Self {
        Self { rules: rules.into() }
    }

    pub fn rules(&self) -> &[HostRule] {
        &self.rules
    }

    /// Routes for a target host. Never empty.
    ///
    /// The host is matched in ASCII lowercase, the form `url` already
    /// produces, so patterns should be written in lowercase.
    pub fn select_host(&self, host: &str) -> Vec<Route> {
        let host = host.to_ascii_lowercase();
        let mut routes: Vec<Route> = matcher::select(&self.rules, &host)
            .filter_map(HostRule::endpoint)
            .map(Route::Proxy)
            .collect();

        if routes.is_empty() {
            routes.push(Route::NO_PROXY);
        }

        tracing::debug!(host = %host, routes = ?routes, "Matching proxies");
        routes
    }

    /// Routes for a request URI. A URI without a host is matched as `""`.
    pub fn select(&self, uri: &Uri) -> Vec<Route> {
        self.select_host(uri.host().unwrap_or_default())
    }

    /// Routes for a parsed URL.
    pub fn select_url(&self, url: &url::Url) -> Vec<Route> {
        self.select_host(url.host_str().unwrap_or_default())
    }
}
