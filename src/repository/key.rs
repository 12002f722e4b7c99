//! Repository Key
//!
//! Identifies one payload source: an API host plus a client key.

use std::fmt;

use crate::error::RepositoryError;

/// Separator used in the persisted `host||clientKey` form.
pub const KEY_SEPARATOR: &str = "||";

// == Repository Key ==
/// A `(host, client key)` pair.
///
/// Client keys may not contain `|`, so the last [`KEY_SEPARATOR`] in the
/// composite string always marks the boundary and distinct pairs never
/// share a composite form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryKey {
    host: String,
    client_key: String,
}

impl RepositoryKey {
    /// Builds a key, trimming trailing slashes from the host.
    pub fn new(host: &str, client_key: &str) -> Result<Self, RepositoryError> {
        let host = host.trim_end_matches('/');
        if host.is_empty() {
            return Err(RepositoryError::InvalidKey("host cannot be empty".to_string()));
        }
        if client_key.is_empty() {
            return Err(RepositoryError::InvalidKey(
                "client key cannot be empty".to_string(),
            ));
        }
        if client_key.contains('|') {
            return Err(RepositoryError::InvalidKey(
                "client key cannot contain '|'".to_string(),
            ));
        }

        Ok(Self {
            host: host.to_string(),
            client_key: client_key.to_string(),
        })
    }

    /// Parses the persisted `host||clientKey` form.
    pub fn parse(raw: &str) -> Result<Self, RepositoryError> {
        let (host, client_key) = raw
            .rsplit_once(KEY_SEPARATOR)
            .ok_or_else(|| RepositoryError::InvalidKey(format!("missing separator in '{}'", raw)))?;
        Self::new(host, client_key)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn client_key(&self) -> &str {
        &self.client_key
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.host, KEY_SEPARATOR, self.client_key)
    }
}
