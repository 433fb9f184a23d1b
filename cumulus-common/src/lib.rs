//! # Cumulus Common
//!
//! Shared utilities for the Cumulus binaries.
//!
//! ## Logging
//!
//! ```rust,ignore
//! use cumulus_common::{init_logging_with_format, LogFormat};
//!
//! init_logging_with_format("info", LogFormat::Json)?;
//! ```

pub mod logging;

pub use logging::{init_logging, init_logging_json, init_logging_with_format, LogFormat};
