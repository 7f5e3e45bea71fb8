//! test utilities for creating test nodes and other fixtures.
//!
//! this module provides builder patterns for creating test instances
//! of meshwire types without needing to specify all fields.

use ipnet::IpNet;

use crate::{NetworkId, Node, NodeId, StaticNode, TagId, TagSet};

/// builder for creating test [`Node`] instances.
///
/// # example
/// ```
/// use meshwire_types::test_utils::TestNodeBuilder;
///
/// let node = TestNodeBuilder::new(1).build();
/// let tagged = TestNodeBuilder::new(2).with_tags(["web"]).build();
/// ```
#[derive(Debug, Clone)]
pub struct TestNodeBuilder {
    id: u64,
    name: Option<String>,
    network: NetworkId,
    tags: Vec<TagId>,
    ipv4: Option<IpNet>,
    ipv6: Option<IpNet>,
    ingress_gateway: bool,
    static_node: Option<StaticNode>,
}

impl TestNodeBuilder {
    /// create a new builder with the given node id, in network `mesh`.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: None,
            network: NetworkId::from("mesh"),
            tags: vec![],
            ipv4: None,
            ipv6: None,
            ingress_gateway: false,
            static_node: None,
        }
    }

    /// set the network.
    pub fn in_network(mut self, net: impl Into<NetworkId>) -> Self {
        self.network = net.into();
        self
    }

    /// set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// set tags for the node.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TagId>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// set the ipv4 prefix (cidr string).
    pub fn with_ipv4(mut self, cidr: &str) -> Self {
        self.ipv4 = Some(cidr.parse().expect("valid ipv4 cidr"));
        self
    }

    /// set the ipv6 prefix (cidr string).
    pub fn with_ipv6(mut self, cidr: &str) -> Self {
        self.ipv6 = Some(cidr.parse().expect("valid ipv6 cidr"));
        self
    }

    /// mark the node as an ingress gateway.
    pub fn ingress_gateway(mut self) -> Self {
        self.ingress_gateway = true;
        self
    }

    /// attach a static client, marking the node static.
    pub fn with_static_node(mut self, static_node: StaticNode) -> Self {
        self.static_node = Some(static_node);
        self
    }

    /// build the [`Node`].
    pub fn build(self) -> Node {
        let name = self.name.unwrap_or_else(|| format!("node-{}", self.id));
        let is_static = self.static_node.is_some();
        Node {
            id: NodeId(self.id),
            name,
            network: self.network,
            tags: TagSet::new(self.tags),
            ipv4: self.ipv4,
            ipv6: self.ipv6,
            is_ingress_gateway: self.ingress_gateway,
            is_static,
            static_node: self.static_node,
        }
    }
}

/// builder for creating test [`StaticNode`] instances.
#[derive(Debug, Clone)]
pub struct TestStaticNodeBuilder {
    client_id: String,
    owner: String,
    network: NetworkId,
    address: Option<IpNet>,
    address6: Option<IpNet>,
    enabled: bool,
    tags: Vec<TagId>,
    ingress_gateway_id: Option<NodeId>,
}

impl TestStaticNodeBuilder {
    /// create a new builder for a client owned by the given user.
    pub fn new(client_id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            owner: owner.into(),
            network: NetworkId::from("mesh"),
            address: None,
            address6: None,
            enabled: true,
            tags: vec![],
            ingress_gateway_id: None,
        }
    }

    /// set the network.
    pub fn in_network(mut self, net: impl Into<NetworkId>) -> Self {
        self.network = net.into();
        self
    }

    /// set the client-owned ipv4 prefix (cidr string).
    pub fn with_address(mut self, cidr: &str) -> Self {
        self.address = Some(cidr.parse().expect("valid ipv4 cidr"));
        self
    }

    /// set the client-owned ipv6 prefix (cidr string).
    pub fn with_address6(mut self, cidr: &str) -> Self {
        self.address6 = Some(cidr.parse().expect("valid ipv6 cidr"));
        self
    }

    /// disable the client.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// set tags for the client.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TagId>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// set the gateway the client terminates on.
    pub fn behind_gateway(mut self, id: NodeId) -> Self {
        self.ingress_gateway_id = Some(id);
        self
    }

    /// build the [`StaticNode`].
    pub fn build(self) -> StaticNode {
        StaticNode {
            client_id: self.client_id,
            owner: self.owner,
            network: self.network,
            address: self.address,
            address6: self.address6,
            enabled: self.enabled,
            tags: TagSet::new(self.tags),
            ingress_gateway_id: self.ingress_gateway_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let node = TestNodeBuilder::new(1).build();
        assert_eq!(node.id.0, 1);
        assert_eq!(node.name, "node-1");
        assert!(node.tags.is_empty());
        assert!(!node.is_static);
    }

    #[test]
    fn test_builder_with_tags() {
        let node = TestNodeBuilder::new(2).with_tags(["web", "db"]).build();
        assert!(node.tags.contains(&TagId::from("web")));
        assert!(node.tags.contains(&TagId::from("db")));
    }

    #[test]
    fn test_builder_static_node() {
        let node = TestNodeBuilder::new(3)
            .with_static_node(
                TestStaticNodeBuilder::new("laptop", "alice")
                    .with_address("10.0.0.50/32")
                    .build(),
            )
            .build();
        assert!(node.is_static);
        assert_eq!(node.resolved().ipv4, Some("10.0.0.50/32".parse().unwrap()));
    }
}
