//! Proxy rule definition.
//!
//! A `HostRule` couples a set of host patterns with the upstream proxy that
//! serves them and, optionally, the credentials that proxy expects.
//! Patterns are compiled once, anchored at both ends, so matching is always
//! a whole-host comparison.

use regex::Regex;

use crate::config::schema::{non_blank, ProxyRuleConfig};
use crate::routing::selector::ProxyEndpoint;

/// One configured proxy rule. Immutable after construction.
#[derive(Debug, Clone)]
pub struct HostRule {
    patterns: Vec<Regex>,
    proxy_host: String,
    proxy_port: u16,
    proxy_user: Option<String>,
    proxy_password: Option<String>,
}

impl HostRule {
    /// Create a rule for the given patterns and proxy.
    ///
    /// An empty pattern list matches every host.
    pub fn new<I, S>(patterns: I, proxy_host: impl Into<String>, proxy_port: u16) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(&format!("^(?:{})$", p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            proxy_host: proxy_host.into(),
            proxy_port,
            proxy_user: None,
            proxy_password: None,
        })
    }

    /// Catch-all rule sending every host to the given proxy.
    pub fn wildcard(proxy_host: impl Into<String>, proxy_port: u16) -> Self {
        Self {
            patterns: Vec::new(),
            proxy_host: proxy_host.into(),
            proxy_port,
            proxy_user: None,
            proxy_password: None,
        }
    }

    /// Attach proxy credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.proxy_user = Some(user.into());
        self.proxy_password = Some(password.into());
        self
    }

    /// Compile a rule from its configuration.
    pub fn from_config(config: &ProxyRuleConfig) -> Result<Self, regex::Error> {
        let mut rule = Self::new(&config.host_patterns, config.proxy_host.clone(), config.proxy_port)?;
        rule.proxy_user = config.proxy_user.clone();
        rule.proxy_password = config.proxy_password.clone();
        Ok(rule)
    }

    /// Compile every rule, preserving order.
    pub fn compile_all(configs: &[ProxyRuleConfig]) -> Result<Vec<Self>, regex::Error> {
        configs.iter().map(Self::from_config).collect()
    }

    /// True if this rule applies to `host`.
    pub fn matches(&self, host: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_match(host))
    }

    pub fn proxy_host(&self) -> &str {
        &self.proxy_host
    }

    pub fn proxy_port(&self) -> u16 {
        self.proxy_port
    }

    /// The proxy endpoint, unless the proxy host is blank.
    pub fn endpoint(&self) -> Option<ProxyEndpoint> {
        non_blank(Some(&self.proxy_host)).map(|host| ProxyEndpoint::new(host, self.proxy_port))
    }

    /// User and password, if both are non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (
            non_blank(self.proxy_user.as_deref()),
            non_blank(self.proxy_password.as_deref()),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }

    /// True if the rule carries usable credentials.
    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_some()
    }
}
