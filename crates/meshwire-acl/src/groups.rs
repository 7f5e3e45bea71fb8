//! user group registry and reactive access revocation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use meshwire_store::{Store, USER_GROUPS_TABLE};
use meshwire_types::{GroupId, NetworkId, RoleId, UserGroup};

use crate::directory::{GroupLookup, NodeDirectory, PeerBroker, UserDirectory};
use crate::error::{Error, Result, ValidationError};
use crate::roles::RoleRegistry;

/// crud for user groups.
///
/// group membership lives on the users; deleting a group strips it from
/// every member through the user directory before removing the record.
pub struct GroupRegistry {
    store: Arc<dyn Store>,
    roles: Arc<RoleRegistry>,
    users: Arc<dyn UserDirectory>,
}

impl GroupRegistry {
    /// create a registry over the given store and collaborators.
    pub fn new(
        store: Arc<dyn Store>,
        roles: Arc<RoleRegistry>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            roles,
            users,
        }
    }

    /// validate a create or update request: every referenced network
    /// role must resolve.
    pub fn validate_roles(&self, group: &UserGroup) -> Result<()> {
        for roles in group.network_roles.values() {
            for role_id in roles {
                if !self.roles.exists(role_id) {
                    return Err(ValidationError::UnknownRole(role_id.clone()).into());
                }
            }
        }
        Ok(())
    }

    /// create a group; fails if the id is already taken.
    pub fn create(&self, group: &UserGroup) -> Result<()> {
        if group.id.is_empty() {
            return Err(Error::EmptyGroupId);
        }
        if self.get(&group.id).is_ok() {
            return Err(Error::GroupExists(group.id.clone()));
        }
        let data = serde_json::to_string(group)?;
        self.store
            .insert(USER_GROUPS_TABLE, group.id.as_str(), &data)?;
        Ok(())
    }

    /// fetch a group by id.
    pub fn get(&self, id: &GroupId) -> Result<UserGroup> {
        match self.store.fetch_record(USER_GROUPS_TABLE, id.as_str()) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(err) if err.is_empty_record() => Err(Error::GroupNotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// every group.
    pub fn list(&self) -> Result<Vec<UserGroup>> {
        let records = match self.store.fetch_records(USER_GROUPS_TABLE) {
            Ok(records) => records,
            Err(err) if err.is_empty_record() => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut groups = Vec::with_capacity(records.len());
        for data in records.values() {
            groups.push(serde_json::from_str(data)?);
        }
        Ok(groups)
    }

    /// replace an existing group.
    pub fn update(&self, group: &UserGroup) -> Result<()> {
        if group.id.is_empty() {
            return Err(Error::EmptyGroupId);
        }
        self.get(&group.id)?;
        let data = serde_json::to_string(group)?;
        self.store
            .insert(USER_GROUPS_TABLE, group.id.as_str(), &data)?;
        Ok(())
    }

    /// delete a group, stripping the membership from every user first.
    pub fn delete(&self, id: &GroupId) -> Result<()> {
        for mut user in self.users.list_users() {
            if user.groups.remove(id) {
                self.users.upsert_user(user);
            }
        }
        self.store.delete_record(USER_GROUPS_TABLE, id.as_str())?;
        debug!(group = %id, "deleted user group");
        Ok(())
    }
}

impl GroupLookup for GroupRegistry {
    fn get_group(&self, id: &GroupId) -> Option<UserGroup> {
        self.get(id).ok()
    }

    fn groups_in_network(&self, net: &NetworkId) -> Vec<UserGroup> {
        self.list()
            .unwrap_or_default()
            .into_iter()
            .filter(|group| group.in_network(net))
            .collect()
    }
}

/// tear down static client access after a group loses network roles.
///
/// diffs the group's per-network roles before and after an update; in
/// every network that lost a role, static clients owned by service
/// users are removed and the data plane is told to drop their peers.
pub fn revoke_gw_access_on_role_change(
    curr: &HashMap<NetworkId, HashSet<RoleId>>,
    updated: &HashMap<NetworkId, HashSet<RoleId>>,
    users: &dyn UserDirectory,
    nodes: &dyn NodeDirectory,
    broker: &dyn PeerBroker,
) {
    let mut lost_networks: HashSet<NetworkId> = HashSet::new();
    for (net, roles) in curr {
        match updated.get(net) {
            None => {
                if !roles.is_empty() {
                    lost_networks.insert(net.clone());
                }
            }
            Some(kept) => {
                if roles.iter().any(|role| !kept.contains(role)) {
                    lost_networks.insert(net.clone());
                }
            }
        }
    }
    if lost_networks.is_empty() {
        return;
    }

    for client in nodes.all_ext_clients() {
        if !lost_networks.contains(&client.network) {
            continue;
        }
        let Some(owner) = users.get_user(&client.owner) else {
            continue;
        };
        // only vpn-only users lose access with their group roles
        if owner.platform_role_id.as_str() != RoleId::SERVICE_USER {
            continue;
        }
        if nodes.delete_ext_client(&client) {
            broker.publish_deleted_client_peer_update(&client);
            debug!(client = %client.client_id, owner = %client.owner, "revoked static client");
        } else {
            warn!(client = %client.client_id, "failed to delete revoked static client");
        }
    }
}
