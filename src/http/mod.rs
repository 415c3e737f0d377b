//! HTTP client decoration subsystem.
//!
//! # Data Flow
//! ```text
//! HttpClientConfig
//!     → decorator.rs (compile rules, build authenticator)
//!     → decorate(builder):
//!         timeouts → security context → proxy selector → authenticator
//!     → builder.rs ClientBuilder trait
//!         ├── reqwest_builder.rs (reqwest::ClientBuilder)
//!         └── hyper_builder.rs + connector.rs (hyper-util legacy client)
//! ```
//!
//! # Design Decisions
//! - The decorator only sequences; it makes no routing or TLS decisions
//! - Any client type can be decorated by implementing `ClientBuilder`

pub mod builder;
pub mod connector;
pub mod decorator;
pub mod hyper_builder;
pub mod reqwest_builder;

pub use builder::ClientBuilder;
pub use connector::{ConnectError, ProxyConnector, ProxyStream};
pub use decorator::HttpClientDecorator;
pub use hyper_builder::HyperClientBuilder;
pub use reqwest_builder::ReqwestClientBuilder;
