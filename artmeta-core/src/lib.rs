//! artmeta core library: metadata model, header extraction, configuration.
//!
//! - [`types`]: newtypes and the [`Metadata`] model
//! - [`frontmatter`]: header extraction from raw document bytes
//! - [`config`]: JSON configuration with a type-tagged storage section
//! - [`error`]: error enums shared by the crates above

pub mod config;
pub mod error;
pub mod frontmatter;
pub mod types;

pub use config::{B2Config, Config, FsConfig, LogLevel, StorageConfig};
pub use error::{ConfigError, FrontmatterError, GeolocationError};
pub use frontmatter::{extract, Extracted};
pub use types::{DocumentHandle, Fingerprint, Geolocation, Metadata};
