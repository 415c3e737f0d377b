//! Rule matching logic.
//!
//! # Responsibilities
//! - Pick the rules that apply to a target host
//! - Keep configuration order in the result
//!
//! # Design Decisions
//! - A rule matches when it has no patterns (wildcard) or any pattern
//!   matches the whole host
//! - No case folding here; `ProxySelector` lowercases the host first
//! - Lazy: callers that only need the first match stop early

use crate::routing::rule::HostRule;

/// Yields every rule that applies to `host`, in input order.
pub fn select<'a>(rules: &'a [HostRule], host: &'a str) -> impl Iterator<Item = &'a HostRule> + 'a {
    rules.iter().filter(move |rule| rule.matches(host))
}
