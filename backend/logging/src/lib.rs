//! Structured logging for aquadash.
//!
//! Console and rolling-file output via `tracing-subscriber`, plus credential
//! redaction for anything that might carry upstream secrets.

pub mod logger;
pub mod redact;

pub use logger::init_logger;
pub use redact::redact_sensitive_data;
