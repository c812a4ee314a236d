//! Error types for artmeta-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to decode a document header that is present.
///
/// A missing header is not an error; see [`crate::frontmatter::extract`].
#[derive(Debug, Error)]
pub enum FrontmatterError {
    /// The header block is not valid UTF-8.
    #[error("header is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The header YAML is malformed or a field has the wrong type.
    #[error("failed to decode header: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Invalid `geolocation` value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    /// Neither empty nor two or three space-separated tokens.
    #[error("invalid geolocation '{value}', expecting '<x> <y> [areaError]' or an empty string")]
    Shape { value: String },

    /// A token did not parse as a real number.
    #[error("invalid geolocation parameter, expected a number for {component}: '{token}'")]
    Number {
        component: &'static str,
        token: String,
    },
}

/// All errors that can arise while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An environment reference in the file could not be expanded.
    #[error("failed to expand environment in {path}: {message}")]
    Expand { path: PathBuf, message: String },

    /// JSON parse error, including unknown storage `Type` tags.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Decoded config violates a constraint.
    #[error("invalid config at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}
