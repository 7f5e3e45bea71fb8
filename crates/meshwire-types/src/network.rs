//! network identity types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// sentinel network id granting a role in every network.
pub const ALL_NETWORKS: &str = "all-networks";

/// unique identifier for an overlay network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    /// create a network id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// the [`ALL_NETWORKS`] sentinel.
    pub fn all() -> Self {
        Self(ALL_NETWORKS.to_string())
    }

    /// get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// whether this is the [`ALL_NETWORKS`] sentinel.
    pub fn is_all(&self) -> bool {
        self.0 == ALL_NETWORKS
    }

    /// whether the id is empty (never valid for a real network).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NetworkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// an overlay network as seen by the policy engine.
///
/// the full network entity (address ranges, dns settings, ...) lives in
/// the network subsystem; the engine only needs identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// unique identifier.
    pub id: NetworkId,

    /// human-readable display name.
    #[serde(default)]
    pub name: String,
}

impl Network {
    /// create a network with the given id, named after it.
    pub fn new(id: impl Into<NetworkId>) -> Self {
        let id = id.into();
        let name = id.to_string();
        Self { id, name }
    }
}
