//! Proxy authentication subsystem.
//!
//! # Responsibilities
//! - Map proxy endpoints to configured basic-auth credentials
//! - Answer 407 challenges at most once per request
//!
//! # Design Decisions
//! - Lookup table built once from the rule set, read-only afterwards
//! - Credentials never appear in logs or `Debug` output

pub mod authenticator;

pub use authenticator::{ProxyAuthenticator, ProxyCredentials};
