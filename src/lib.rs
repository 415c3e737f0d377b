//! HTTP client configuration layer.
//!
//! Decorates an HTTP client builder with per-destination proxy routing,
//! proxy authentication, TLS material and timeouts.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML)
//!       │
//!       ▼
//!   ┌──────────┐   ┌──────────────────────┐
//!   │ routing  │──▶│ ProxySelector        │──┐
//!   │ HostRule │   └──────────────────────┘  │
//!   │          │   ┌──────────────────────┐  │   ┌─────────────────────┐
//!   │          │──▶│ auth                 │──┼──▶│ http                │
//!   └──────────┘   │ ProxyAuthenticator   │  │   │ HttpClientDecorator │──▶ ClientBuilder
//!                  └──────────────────────┘  │   └─────────────────────┘    (reqwest, hyper)
//!   ┌──────────────────────────────────────┐ │
//!   │ tls  trust + key → SecurityContext   │─┘
//!   └──────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod http;
pub mod observability;
pub mod routing;
pub mod tls;

pub use auth::{ProxyAuthenticator, ProxyCredentials};
pub use config::{load_config, HttpClientConfig};
pub use http::{ClientBuilder, HttpClientDecorator, HyperClientBuilder, ReqwestClientBuilder};
pub use routing::{HostRule, ProxyEndpoint, ProxySelector, Route};
pub use tls::{build_security_context, load_key_material, load_trust_material, SecurityContext};
