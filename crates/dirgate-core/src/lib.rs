//! dirgate core library
//!
//! Entry types, attribute schemas, list query processing, configuration and
//! the error taxonomy shared by the directory and API crates.

pub mod config;
pub mod error;
pub mod query;
pub mod schema;
pub mod types;
pub mod utils;

pub use config::{DirgateConfig, WriteMode};
pub use error::{Error, Result};

/// dirgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Unit reported in `Content-Range` headers
pub const CONTENT_RANGE_UNIT: &str = "posts";
