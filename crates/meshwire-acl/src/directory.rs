//! upstream contracts consumed by the policy engine.
//!
//! the engine never calls the node, user or network subsystems directly;
//! their lookups are injected through these traits. this keeps the
//! registry layered on the store alone and breaks the circular
//! dependency between acl logic and user management.

use meshwire_types::{GroupId, Network, NetworkId, Node, NodeId, StaticNode, Tag, TagId, User, UserGroup};

/// node registry lookups.
pub trait NodeDirectory: Send + Sync {
    /// every node across all networks.
    fn all_nodes(&self) -> Vec<Node>;

    /// a single node by id.
    fn node_by_id(&self, id: NodeId) -> Option<Node>;

    /// static user-client nodes in a network.
    fn static_user_nodes(&self, net: &NetworkId) -> Vec<Node>;

    /// every static client across all networks.
    fn all_ext_clients(&self) -> Vec<StaticNode>;

    /// remove a static client after its access was revoked.
    ///
    /// returns true when the client existed and was removed.
    fn delete_ext_client(&self, client: &StaticNode) -> bool;
}

/// user registry lookups.
pub trait UserDirectory: Send + Sync {
    /// a user by username.
    fn get_user(&self, name: &str) -> Option<User>;

    /// every user.
    fn list_users(&self) -> Vec<User>;

    /// persist a mutated user (group membership updates).
    fn upsert_user(&self, user: User);
}

/// device tag lookups.
pub trait TagDirectory: Send + Sync {
    /// a device tag by id.
    fn get_tag(&self, id: &TagId) -> Option<Tag>;
}

/// network lookups.
pub trait NetworkDirectory: Send + Sync {
    /// a network by id.
    fn get_network(&self, id: &NetworkId) -> Option<Network>;
}

/// user-group lookups injected into policy validation and evaluation.
pub trait GroupLookup: Send + Sync {
    /// a group by id.
    fn get_group(&self, id: &GroupId) -> Option<UserGroup>;

    /// groups granting any role in the given network.
    fn groups_in_network(&self, net: &NetworkId) -> Vec<UserGroup>;
}

/// broker push notifying the data plane of revoked clients.
pub trait PeerBroker: Send + Sync {
    /// publish a peer update after a static client was removed.
    fn publish_deleted_client_peer_update(&self, client: &StaticNode);
}
