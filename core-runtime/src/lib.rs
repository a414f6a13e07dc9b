//! Runtime support for the audiobook curation core: configuration and
//! logging bootstrap shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, ProviderConfig, ServerConfig};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
