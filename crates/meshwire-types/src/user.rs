//! user and user-group types.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::NetworkId;
use crate::role::RoleId;

/// unique identifier for a user group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// create a group id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// whether the id is empty (never valid for a real group).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// a user of the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// unique username.
    pub username: String,

    /// platform-wide role.
    pub platform_role_id: RoleId,

    /// per-network role assignments.
    #[serde(default)]
    pub network_roles: HashMap<NetworkId, HashSet<RoleId>>,

    /// group memberships.
    #[serde(default)]
    pub groups: HashSet<GroupId>,
}

impl User {
    /// create a user with the given username and platform role.
    pub fn new(username: impl Into<String>, platform_role_id: RoleId) -> Self {
        Self {
            username: username.into(),
            platform_role_id,
            network_roles: HashMap::new(),
            groups: HashSet::new(),
        }
    }

    /// every network role the user holds, across networks.
    pub fn all_network_roles(&self) -> HashSet<&RoleId> {
        self.network_roles.values().flatten().collect()
    }
}

/// a named group of users carrying per-network roles.
///
/// membership is stored on the users; the group side is resolved through
/// a reverse index at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGroup {
    /// unique identifier.
    pub id: GroupId,

    /// human-readable name.
    #[serde(default)]
    pub name: String,

    /// roles the group grants, per network.
    #[serde(default)]
    pub network_roles: HashMap<NetworkId, HashSet<RoleId>>,
}

impl UserGroup {
    /// create an empty group.
    pub fn new(id: impl Into<GroupId>) -> Self {
        let id = id.into();
        let name = id.to_string();
        Self {
            id,
            name,
            network_roles: HashMap::new(),
        }
    }

    /// whether the group grants any role in the given network.
    ///
    /// the all-networks sentinel counts for every network.
    pub fn in_network(&self, net: &NetworkId) -> bool {
        self.network_roles
            .keys()
            .any(|n| n == net || n.is_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_all_network_roles() {
        let mut user = User::new("alice", RoleId::from("service-user"));
        user.network_roles.insert(
            NetworkId::from("mesh"),
            [RoleId::from("network-admin")].into_iter().collect(),
        );
        user.network_roles.insert(
            NetworkId::from("lab"),
            [RoleId::from("network-user")].into_iter().collect(),
        );

        let roles = user.all_network_roles();
        assert_eq!(roles.len(), 2);
        assert!(roles.contains(&RoleId::from("network-admin")));
    }

    #[test]
    fn test_group_in_network() {
        let mut group = UserGroup::new("eng");
        group.network_roles.insert(
            NetworkId::from("mesh"),
            [RoleId::from("network-user")].into_iter().collect(),
        );

        assert!(group.in_network(&NetworkId::from("mesh")));
        assert!(!group.in_network(&NetworkId::from("lab")));
    }

    #[test]
    fn test_group_all_networks_sentinel() {
        let mut group = UserGroup::new("ops");
        group.network_roles.insert(
            NetworkId::all(),
            [RoleId::from("network-admin")].into_iter().collect(),
        );

        assert!(group.in_network(&NetworkId::from("anything")));
    }
}
