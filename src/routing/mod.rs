//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing connection (target URI)
//!     → selector.rs (host lookup)
//!     → matcher.rs (evaluate rule patterns)
//!     → Return: ordered proxy chain, or [DIRECT]
//!
//! Rule Compilation (at startup):
//!     ProxyRuleConfig[]
//!     → rule.rs (anchor & compile patterns)
//!     → Freeze as immutable ProxySelector
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - Deterministic: same input always yields the same chain
//! - Configuration order is priority order

pub mod matcher;
pub mod rule;
pub mod selector;

pub use rule::HostRule;
pub use selector::{ProxyEndpoint, ProxySelector, Route};
