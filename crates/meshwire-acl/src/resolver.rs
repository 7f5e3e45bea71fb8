//! evaluation-time identity indexes.
//!
//! the resolver inverts the node and user registries into the lookups
//! evaluation needs: tag -> member nodes and group -> member usernames.
//! Indexes are computed on demand and are only as fresh as the moment of
//! the call; staleness within a single evaluation is acceptable because
//! membership is allow-additive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use meshwire_types::{GroupId, NetworkId, Node, NodeId, Tag, TagId, WILDCARD};

use crate::directory::{NodeDirectory, TagDirectory, UserDirectory};

/// resolves subjects and objects to concrete sets at evaluation time.
pub struct IdentityResolver {
    nodes: Arc<dyn NodeDirectory>,
    users: Arc<dyn UserDirectory>,
    tags: Arc<dyn TagDirectory>,
}

impl IdentityResolver {
    /// create a resolver over the given directories.
    pub fn new(
        nodes: Arc<dyn NodeDirectory>,
        users: Arc<dyn UserDirectory>,
        tags: Arc<dyn TagDirectory>,
    ) -> Self {
        Self { nodes, users, tags }
    }

    /// look up a device tag, verifying it exists.
    pub fn tag(&self, id: &TagId) -> Option<Tag> {
        self.tags.get_tag(id)
    }

    /// a node by id.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.node_by_id(id)
    }

    /// every node across all networks.
    pub fn all_nodes(&self) -> Vec<Node> {
        self.nodes.all_nodes()
    }

    /// static user-client nodes in a network.
    pub fn static_user_nodes(&self, net: &NetworkId) -> Vec<Node> {
        self.nodes.static_user_nodes(net)
    }

    /// inverted index mapping each tag to its member nodes in a network.
    ///
    /// the synthetic [`WILDCARD`] entry holds every eligible node, so
    /// wildcard subjects and objects expand like any other tag. with
    /// `static_only` set, non-static nodes are excluded; rule compilation
    /// uses this when the target is an ingress gateway, where only the
    /// static clients terminating on it are peers of interest. disabled
    /// static clients are never eligible.
    pub fn tag_node_map(&self, net: &NetworkId, static_only: bool) -> HashMap<TagId, Vec<Node>> {
        let mut map: HashMap<TagId, Vec<Node>> = HashMap::new();
        for node in self.nodes.all_nodes() {
            let node = node.resolved();
            if node.network != *net {
                continue;
            }
            if static_only && !node.is_static {
                continue;
            }
            if let Some(sn) = &node.static_node {
                if !sn.enabled {
                    continue;
                }
            }
            for tag in node.tags.snapshot() {
                map.entry(tag).or_default().push(node.clone());
            }
            map.entry(TagId::from(WILDCARD)).or_default().push(node);
        }
        map
    }

    /// inverted index mapping each group to the usernames it contains.
    pub fn user_group_map(&self) -> HashMap<GroupId, HashSet<String>> {
        let mut map: HashMap<GroupId, HashSet<String>> = HashMap::new();
        for user in self.users.list_users() {
            for group in &user.groups {
                map.entry(group.clone())
                    .or_default()
                    .insert(user.username.clone());
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwire_types::test_utils::{TestNodeBuilder, TestStaticNodeBuilder};
    use meshwire_types::{RoleId, User};

    use crate::testing::MockDirectory;

    fn resolver(dir: &Arc<MockDirectory>) -> IdentityResolver {
        IdentityResolver::new(dir.clone(), dir.clone(), dir.clone())
    }

    #[test]
    fn test_tag_node_map_inverts_tags() {
        let dir = Arc::new(MockDirectory::new());
        dir.add_node(
            TestNodeBuilder::new(1)
                .with_tags(["db"])
                .with_ipv4("10.0.0.1/32")
                .build(),
        );
        dir.add_node(
            TestNodeBuilder::new(2)
                .with_tags(["web", "db"])
                .with_ipv4("10.0.0.2/32")
                .build(),
        );

        let map = resolver(&dir).tag_node_map(&NetworkId::from("mesh"), false);
        assert_eq!(map[&TagId::from("db")].len(), 2);
        assert_eq!(map[&TagId::from("web")].len(), 1);
        assert_eq!(map[&TagId::from(WILDCARD)].len(), 2);
    }

    #[test]
    fn test_tag_node_map_scoped_to_network() {
        let dir = Arc::new(MockDirectory::new());
        dir.add_node(TestNodeBuilder::new(1).with_tags(["db"]).build());
        dir.add_node(
            TestNodeBuilder::new(2)
                .in_network("lab")
                .with_tags(["db"])
                .build(),
        );

        let map = resolver(&dir).tag_node_map(&NetworkId::from("mesh"), false);
        assert_eq!(map[&TagId::from("db")].len(), 1);
    }

    #[test]
    fn test_tag_node_map_static_only() {
        let dir = Arc::new(MockDirectory::new());
        dir.add_node(TestNodeBuilder::new(1).with_tags(["db"]).build());
        dir.add_node(
            TestNodeBuilder::new(2)
                .with_static_node(
                    TestStaticNodeBuilder::new("laptop", "alice")
                        .with_address("10.0.0.50/32")
                        .with_tags(["db"])
                        .build(),
                )
                .build(),
        );

        let map = resolver(&dir).tag_node_map(&NetworkId::from("mesh"), true);
        assert_eq!(map[&TagId::from("db")].len(), 1);
        assert!(map[&TagId::from("db")][0].is_static);
    }

    #[test]
    fn test_tag_node_map_skips_disabled_clients() {
        let dir = Arc::new(MockDirectory::new());
        dir.add_node(
            TestNodeBuilder::new(1)
                .with_static_node(
                    TestStaticNodeBuilder::new("laptop", "alice")
                        .with_tags(["db"])
                        .disabled()
                        .build(),
                )
                .build(),
        );

        let map = resolver(&dir).tag_node_map(&NetworkId::from("mesh"), false);
        assert!(map.is_empty());
    }

    #[test]
    fn test_user_group_map() {
        let dir = Arc::new(MockDirectory::new());
        let mut alice = User::new("alice", RoleId::from(RoleId::SERVICE_USER));
        alice.groups.insert(GroupId::from("eng"));
        let mut bob = User::new("bob", RoleId::from(RoleId::SERVICE_USER));
        bob.groups.insert(GroupId::from("eng"));
        bob.groups.insert(GroupId::from("ops"));
        dir.add_user(alice);
        dir.add_user(bob);

        let map = resolver(&dir).user_group_map();
        assert_eq!(map[&GroupId::from("eng")].len(), 2);
        assert_eq!(map[&GroupId::from("ops")].len(), 1);
        assert!(map[&GroupId::from("ops")].contains("bob"));
    }
}
