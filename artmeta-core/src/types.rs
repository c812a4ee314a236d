//! Domain types for artmeta.
//!
//! [`Metadata`] is built fresh from a document header on every run; its only
//! durable form is the attribute set a storage backend writes onto the object.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::GeolocationError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A document path within the store, relative to the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentHandle(pub String);

impl DocumentHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DocumentHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentHandle {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Lowercase hex content hash of a document's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Header fields extracted from the top of a document.
///
/// Every field is optional. Scalar fields accept any YAML scalar (numbers and
/// booleans are kept as their textual form); sequences or mappings where a
/// scalar is expected fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub short_description: Option<String>,
    /// Free-form; not parsed further.
    #[serde(default, deserialize_with = "scalar_string")]
    pub action_date: Option<String>,
    #[serde(default, deserialize_with = "published_time")]
    pub published_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub thumbnail: Option<String>,
    /// Order and duplicates are kept as written.
    #[serde(default, deserialize_with = "scalar_strings")]
    pub tags: Option<Vec<String>>,
    /// Raw `"<x> <y> [areaError]"` text; see [`Metadata::validate`].
    #[serde(default, deserialize_with = "scalar_string")]
    pub geolocation: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub timezone: Option<String>,
}

impl Metadata {
    /// Check field shapes that serde cannot express.
    ///
    /// Storage backends call this before any network effect.
    pub fn validate(&self) -> Result<(), GeolocationError> {
        if let Some(raw) = &self.geolocation {
            Geolocation::parse_optional(raw)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Geolocation
// ---------------------------------------------------------------------------

/// A point with an optional area error radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geolocation {
    pub x: f64,
    pub y: f64,
    pub area_error: Option<f64>,
}

impl Geolocation {
    /// Parse a geolocation that may be empty.
    ///
    /// Tokens are separated by single spaces, so doubled spaces produce an
    /// empty token and are rejected.
    pub fn parse_optional(value: &str) -> Result<Option<Self>, GeolocationError> {
        if value.is_empty() {
            return Ok(None);
        }

        let parts: Vec<&str> = value.split(' ').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(GeolocationError::Shape {
                value: value.to_string(),
            });
        }

        let x = parse_component(parts[0], "x")?;
        let y = parse_component(parts[1], "y")?;
        let area_error = match parts.get(2) {
            Some(token) => Some(parse_component(token, "area error")?),
            None => None,
        };

        Ok(Some(Self { x, y, area_error }))
    }
}

impl FromStr for Geolocation {
    type Err = GeolocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_optional(s)?.ok_or_else(|| GeolocationError::Shape {
            value: s.to_string(),
        })
    }
}

fn parse_component(token: &str, component: &'static str) -> Result<f64, GeolocationError> {
    token.parse::<f64>().map_err(|_| GeolocationError::Number {
        component,
        token: token.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Any YAML scalar, kept as text.
struct ScalarString(String);

impl<'de> Deserialize<'de> for ScalarString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl<'de> Visitor<'de> for ScalarVisitor {
            type Value = ScalarString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(ScalarString(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(ScalarString(v.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ScalarString>::deserialize(deserializer)?.map(|s| s.0))
}

fn scalar_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<ScalarString>>::deserialize(deserializer)?;
    Ok(values.map(|v| v.into_iter().map(|s| s.0).collect()))
}

/// RFC 3339 (a space separator is accepted) or a bare `YYYY-MM-DD` date.
fn published_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<ScalarString>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(raw.0.trim())
        .map(Some)
        .ok_or_else(|| {
            de::Error::custom(format!(
                "invalid publishedTime '{}': expected an RFC 3339 timestamp or YYYY-MM-DD",
                raw.0
            ))
        })
}

pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = value.parse::<DateTime<FixedOffset>>() {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
