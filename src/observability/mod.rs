//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!
//! Consumers:
//!     → logging.rs fmt subscriber (stdout), filtered by RUST_LOG
//! ```
//!
//! # Design Decisions
//! - Routing decisions log at debug, TLS fallbacks at warn/error
//! - Credentials are never logged

pub mod logging;
