//! TLS material subsystem.
//!
//! # Data Flow
//! ```text
//! TlsConfig
//!     → material.rs load_trust_material (platform set, or truststore)
//!     → material.rs load_key_material   (keystore, or none)
//!     → context.rs build_security_context (protocol + both halves)
//!     → SecurityContext handed to the client builder, or none
//! ```
//!
//! # Design Decisions
//! - Fail-open: no function here returns an error to its caller
//! - Incomplete configuration logs at warn, invalid configuration at error
//! - Store type names are matched exactly (`PKCS12`, `PEM`)
//! - Platform anchors are read once per process

pub mod context;
pub mod material;
pub mod store;

pub use context::{build_security_context, default_security_context, SecurityContext, TlsProtocol};
pub use material::{load_key_material, load_trust_material, KeyMaterial, TrustMaterial, TrustSource};
pub use store::{StoreError, StoreType};
