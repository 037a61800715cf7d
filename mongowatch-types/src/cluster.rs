//! Cluster groups and the credentials used to reach them.

use std::fmt;

/// Username/password pair authenticated against the `admin` database.
///
/// Shared read-only by every task polling the group it belongs to.
#[derive(Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Create a new credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether authentication should be attempted at all.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A set of seed addresses believed to belong to the same cluster,
/// polled with one shared credential pair.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterGroup {
    /// Seed URIs in configuration order.
    pub seeds: Vec<String>,

    /// Credentials used for every seed and every discovered member.
    pub credentials: Credentials,
}

impl ClusterGroup {
    /// Create a cluster group from its seeds and credentials.
    pub fn new(
        seeds: Vec<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            seeds,
            credentials: Credentials::new(username, password),
        }
    }
}
