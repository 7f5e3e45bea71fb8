//! node type representing a device on the overlay network.
//!
//! nodes are either regular peers or static clients: external vpn users
//! represented in the graph through a parent node's [`StaticNode`] field.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::network::NetworkId;
use crate::tag::TagId;

/// unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// convert to a stable id string.
    pub fn stable_id(&self) -> String {
        self.0.to_string()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a node's tag set, shared with concurrent re-taggers.
///
/// tag membership may be rewritten while policy evaluation is running,
/// so readers never iterate the live set: [`TagSet::snapshot`] copies it
/// under the lock and evaluation operates on the copy. cloning a
/// [`TagSet`] shares the underlying set, which is how a node handed to
/// the evaluator observes re-tagging done through another handle.
#[derive(Debug, Default)]
pub struct TagSet {
    inner: Arc<RwLock<HashSet<TagId>>>,
}

impl TagSet {
    /// create a tag set from the given tags.
    pub fn new(tags: impl IntoIterator<Item = TagId>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tags.into_iter().collect())),
        }
    }

    /// copy the current tags under the lock.
    pub fn snapshot(&self) -> HashSet<TagId> {
        self.inner.read().unwrap().clone()
    }

    /// whether the set currently contains the tag.
    pub fn contains(&self, tag: &TagId) -> bool {
        self.inner.read().unwrap().contains(tag)
    }

    /// whether the set is currently empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// add a tag.
    pub fn insert(&self, tag: TagId) {
        self.inner.write().unwrap().insert(tag);
    }

    /// remove a tag.
    pub fn remove(&self, tag: &TagId) {
        self.inner.write().unwrap().remove(tag);
    }

    /// replace the whole set.
    pub fn replace(&self, tags: HashSet<TagId>) {
        *self.inner.write().unwrap() = tags;
    }
}

impl Clone for TagSet {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl FromIterator<TagId> for TagSet {
    fn from_iter<I: IntoIterator<Item = TagId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl PartialEq for TagSet {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl Serialize for TagSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tags: Vec<TagId> = self.snapshot().into_iter().collect();
        tags.sort();
        tags.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tags = Vec::<TagId>::deserialize(deserializer)?;
        Ok(Self::new(tags))
    }
}

/// a device on the overlay network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// unique identifier.
    pub id: NodeId,

    /// display name.
    #[serde(default)]
    pub name: String,

    /// network the node belongs to.
    pub network: NetworkId,

    /// tags attached to the node.
    #[serde(default)]
    pub tags: TagSet,

    /// ipv4 address and prefix on the overlay.
    pub ipv4: Option<IpNet>,

    /// ipv6 address and prefix on the overlay.
    pub ipv6: Option<IpNet>,

    /// whether the node terminates static client tunnels.
    #[serde(default)]
    pub is_ingress_gateway: bool,

    /// whether the node represents a static client.
    #[serde(default)]
    pub is_static: bool,

    /// the static client behind this node, when `is_static` is set.
    #[serde(default)]
    pub static_node: Option<StaticNode>,
}

impl Node {
    /// the node shape evaluation runs against.
    ///
    /// static clients carry their addresses and tags in the embedded
    /// [`StaticNode`]; those take the place of the wrapper's before any
    /// tag or address is inspected.
    pub fn resolved(&self) -> Node {
        match &self.static_node {
            Some(sn) if self.is_static => Node {
                id: self.id,
                name: sn.client_id.clone(),
                network: sn.network.clone(),
                tags: sn.tags.clone(),
                ipv4: sn.address,
                ipv6: sn.address6,
                is_ingress_gateway: false,
                is_static: true,
                static_node: Some(sn.clone()),
            },
            _ => self.clone(),
        }
    }
}

/// a static client: an external vpn user terminating on an ingress gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticNode {
    /// client identifier.
    pub client_id: String,

    /// username owning the client.
    pub owner: String,

    /// network the client is attached to.
    pub network: NetworkId,

    /// client-owned ipv4 prefix.
    pub address: Option<IpNet>,

    /// client-owned ipv6 prefix.
    pub address6: Option<IpNet>,

    /// whether the client is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// tags attached to the client.
    #[serde(default)]
    pub tags: TagSet,

    /// gateway node the client tunnel terminates on.
    pub ingress_gateway_id: Option<NodeId>,
}

fn default_enabled() -> bool {
    true
}
