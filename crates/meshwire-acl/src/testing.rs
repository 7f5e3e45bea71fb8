//! in-memory test doubles for the directory traits.
//!
//! [`MockDirectory`] backs the engine's injected lookups in unit and
//! integration tests, standing in for the node, user, tag and network
//! subsystems and for the broker push.

use std::collections::HashMap;
use std::sync::RwLock;

use meshwire_types::{
    GroupId, Network, NetworkId, Node, NodeId, StaticNode, Tag, TagId, User, UserGroup,
};

use crate::directory::{
    GroupLookup, NetworkDirectory, NodeDirectory, PeerBroker, TagDirectory, UserDirectory,
};

/// an in-memory implementation of every directory trait.
#[derive(Default)]
pub struct MockDirectory {
    networks: RwLock<HashMap<NetworkId, Network>>,
    tags: RwLock<HashMap<TagId, Tag>>,
    users: RwLock<HashMap<String, User>>,
    nodes: RwLock<HashMap<NodeId, Node>>,
    groups: RwLock<HashMap<GroupId, UserGroup>>,
    deleted_clients: RwLock<Vec<String>>,
    published: RwLock<Vec<String>>,
}

impl MockDirectory {
    /// create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// register a network.
    pub fn add_network(&self, id: impl Into<NetworkId>) {
        let network = Network::new(id);
        self.networks
            .write()
            .unwrap()
            .insert(network.id.clone(), network);
    }

    /// register a device tag in a network.
    pub fn add_tag(&self, id: impl Into<TagId>, net: impl Into<NetworkId>) {
        let tag = Tag::new(id, net);
        self.tags.write().unwrap().insert(tag.id.clone(), tag);
    }

    /// register a user.
    pub fn add_user(&self, user: User) {
        self.users
            .write()
            .unwrap()
            .insert(user.username.clone(), user);
    }

    /// register a node.
    pub fn add_node(&self, node: Node) {
        self.nodes.write().unwrap().insert(node.id, node);
    }

    /// register a user group.
    pub fn add_group(&self, group: UserGroup) {
        self.groups.write().unwrap().insert(group.id.clone(), group);
    }

    /// client ids removed through [`NodeDirectory::delete_ext_client`].
    pub fn deleted_clients(&self) -> Vec<String> {
        self.deleted_clients.read().unwrap().clone()
    }

    /// client ids announced through the broker.
    pub fn published(&self) -> Vec<String> {
        self.published.read().unwrap().clone()
    }
}

impl NodeDirectory for MockDirectory {
    fn all_nodes(&self) -> Vec<Node> {
        self.nodes.read().unwrap().values().cloned().collect()
    }

    fn node_by_id(&self, id: NodeId) -> Option<Node> {
        self.nodes.read().unwrap().get(&id).cloned()
    }

    fn static_user_nodes(&self, net: &NetworkId) -> Vec<Node> {
        self.nodes
            .read()
            .unwrap()
            .values()
            .filter(|node| {
                node.is_static
                    && node
                        .static_node
                        .as_ref()
                        .is_some_and(|sn| sn.network == *net)
            })
            .cloned()
            .collect()
    }

    fn all_ext_clients(&self) -> Vec<StaticNode> {
        self.nodes
            .read()
            .unwrap()
            .values()
            .filter_map(|node| node.static_node.clone())
            .collect()
    }

    fn delete_ext_client(&self, client: &StaticNode) -> bool {
        let mut nodes = self.nodes.write().unwrap();
        let id = nodes
            .values()
            .find(|node| {
                node.static_node
                    .as_ref()
                    .is_some_and(|sn| sn.client_id == client.client_id)
            })
            .map(|node| node.id);
        match id {
            Some(id) => {
                nodes.remove(&id);
                self.deleted_clients
                    .write()
                    .unwrap()
                    .push(client.client_id.clone());
                true
            }
            None => false,
        }
    }
}

impl UserDirectory for MockDirectory {
    fn get_user(&self, name: &str) -> Option<User> {
        self.users.read().unwrap().get(name).cloned()
    }

    fn list_users(&self) -> Vec<User> {
        self.users.read().unwrap().values().cloned().collect()
    }

    fn upsert_user(&self, user: User) {
        self.add_user(user);
    }
}

impl TagDirectory for MockDirectory {
    fn get_tag(&self, id: &TagId) -> Option<Tag> {
        self.tags.read().unwrap().get(id).cloned()
    }
}

impl NetworkDirectory for MockDirectory {
    fn get_network(&self, id: &NetworkId) -> Option<Network> {
        self.networks.read().unwrap().get(id).cloned()
    }
}

impl GroupLookup for MockDirectory {
    fn get_group(&self, id: &GroupId) -> Option<UserGroup> {
        self.groups.read().unwrap().get(id).cloned()
    }

    fn groups_in_network(&self, net: &NetworkId) -> Vec<UserGroup> {
        self.groups
            .read()
            .unwrap()
            .values()
            .filter(|group| group.in_network(net))
            .cloned()
            .collect()
    }
}

impl PeerBroker for MockDirectory {
    fn publish_deleted_client_peer_update(&self, client: &StaticNode) {
        self.published
            .write()
            .unwrap()
            .push(client.client_id.clone());
    }
}
