//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HttpClientConfig (validated, immutable)
//!     → HttpClientDecorator compiles rules once
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::HttpClientConfig;
pub use schema::ProxyRuleConfig;
pub use schema::StoreConfig;
pub use schema::TimeoutConfig;
pub use schema::TlsConfig;
