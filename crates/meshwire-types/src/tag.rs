//! device tag types.
//!
//! tags are labels attached to nodes and referenced by policies as the
//! matching key. network-scoped tags use the `<network>.<name>` form.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::NetworkId;

/// unique identifier for a device tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    /// create a tag id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// create the network-scoped `<network>.<name>` form.
    pub fn scoped(net: &NetworkId, name: &str) -> Self {
        Self(format!("{net}.{name}"))
    }

    /// get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// a device tag registered in a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// unique identifier.
    pub id: TagId,

    /// network the tag belongs to.
    pub network: NetworkId,

    /// who created the tag.
    #[serde(default)]
    pub created_by: String,

    /// when the tag was created.
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// create a tag in the given network.
    pub fn new(id: impl Into<TagId>, network: impl Into<NetworkId>) -> Self {
        Self {
            id: id.into(),
            network: network.into(),
            created_by: String::new(),
            created_at: Utc::now(),
        }
    }
}
