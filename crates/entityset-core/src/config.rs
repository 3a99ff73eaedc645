//! Session configuration.
//!
//! Collaborators accept either builder calls (`.debug()`, `.read_policy(..)`)
//! or a [`SessionConfig`] loaded from TOML:
//!
//! ```toml
//! debug = true
//! read_policy = "snapshot"
//! tracking = "no_tracking"
//! ```

use crate::{
    db::query::{QueryTracking, ReadPolicy},
    error::{ErrorClass, ErrorOrigin, InternalError},
};
use serde::Deserialize;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Config, err.to_string())
    }
}

///
/// SessionConfig
///
/// Every field is optional; missing fields take their defaults and unknown
/// fields are rejected.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Emit per-operation debug events.
    pub debug: bool,

    /// Default re-enumeration policy for queries.
    pub read_policy: ReadPolicy,

    /// Default tracking mode for queries.
    pub tracking: QueryTracking,
}

impl SessionConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

///
/// TESTS
///
