//! role (permission template) registry.

use std::sync::Arc;

use tracing::debug;

use meshwire_store::{Store, USER_PERMISSIONS_TABLE};
use meshwire_types::{
    ALL_EXT_CLIENTS_RSRC_ID, PermissionScope, Role, RoleId, RsrcId, RsrcType,
};

use crate::directory::UserDirectory;
use crate::error::{Error, Result};

/// crud and seeding for role permission templates.
pub struct RoleRegistry {
    store: Arc<dyn Store>,
}

impl RoleRegistry {
    /// create a registry over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// seed the built-in role templates. safe to call on every boot.
    pub fn seed_default_roles(&self) -> Result<()> {
        for role in [
            Role::super_admin_template(),
            Role::admin_template(),
            Role::platform_user_template(),
            Role::service_user_template(),
        ] {
            let data = serde_json::to_string(&role)?;
            self.store
                .insert(USER_PERMISSIONS_TABLE, role.id.as_str(), &data)?;
        }
        Ok(())
    }

    /// fetch a role by id.
    pub fn get(&self, id: &RoleId) -> Result<Role> {
        match self.store.fetch_record(USER_PERMISSIONS_TABLE, id.as_str()) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(err) if err.is_empty_record() => Err(Error::RoleNotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// whether a role with the given id exists.
    pub fn exists(&self, id: &RoleId) -> bool {
        self.get(id).is_ok()
    }

    /// every role.
    pub fn list(&self) -> Result<Vec<Role>> {
        let records = match self.store.fetch_records(USER_PERMISSIONS_TABLE) {
            Ok(records) => records,
            Err(err) if err.is_empty_record() => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut roles = Vec::with_capacity(records.len());
        for data in records.values() {
            roles.push(serde_json::from_str(data)?);
        }
        Ok(roles)
    }

    /// validate a create request, expanding implied scopes in place.
    pub fn validate_create(&self, role: &mut Role) -> Result<()> {
        if role.id.is_empty() {
            return Err(Error::EmptyRoleId);
        }
        if self.exists(&role.id) {
            return Err(Error::RoleExists(role.id.clone()));
        }
        expand_vpn_access(role);
        Ok(())
    }

    /// validate an update request, expanding implied scopes in place.
    pub fn validate_update(&self, role: &mut Role) -> Result<()> {
        let existing = self.get(&role.id)?;
        if existing.default {
            return Err(Error::DefaultRoleImmutable(role.id.clone()));
        }
        expand_vpn_access(role);
        Ok(())
    }

    /// create a role; fails if the id is already taken.
    pub fn create(&self, role: &Role) -> Result<()> {
        if role.id.is_empty() {
            return Err(Error::EmptyRoleId);
        }
        if self.exists(&role.id) {
            return Err(Error::RoleExists(role.id.clone()));
        }
        let data = serde_json::to_string(role)?;
        self.store
            .insert(USER_PERMISSIONS_TABLE, role.id.as_str(), &data)?;
        Ok(())
    }

    /// replace an existing role.
    pub fn update(&self, role: &Role) -> Result<()> {
        if role.id.is_empty() {
            return Err(Error::EmptyRoleId);
        }
        self.get(&role.id)?;
        let data = serde_json::to_string(role)?;
        self.store
            .insert(USER_PERMISSIONS_TABLE, role.id.as_str(), &data)?;
        Ok(())
    }

    /// delete a role.
    ///
    /// refused while any user still holds the role as their platform role.
    pub fn delete(&self, id: &RoleId, users: &dyn UserDirectory) -> Result<()> {
        if id.is_empty() {
            return Err(Error::EmptyRoleId);
        }
        let role = self.get(id)?;
        for user in users.list_users() {
            if user.platform_role_id == *id {
                return Err(Error::RoleInUse(id.clone()));
            }
        }
        self.store
            .delete_record(USER_PERMISSIONS_TABLE, role.id.as_str())?;
        debug!(role = %id, "deleted role");
        Ok(())
    }

    /// whether a role grants the given resource scope.
    ///
    /// full-access roles bypass the per-resource map.
    pub fn has_network_rsrc_scope(role: &Role, rsrc_type: RsrcType, rsrc_id: &RsrcId) -> bool {
        if role.full_access {
            return true;
        }
        role.network_level_access
            .get(&rsrc_type)
            .is_some_and(|scope| scope.contains_key(rsrc_id))
    }
}

/// a gateway scope carrying vpn access implies managing one's own
/// static clients; grant that scope explicitly.
fn expand_vpn_access(role: &mut Role) {
    let vpn_access = role
        .network_level_access
        .get(&RsrcType::RemoteAccessGateways)
        .is_some_and(|scopes| scopes.values().any(|scope| scope.vpn_access));
    if vpn_access {
        role.network_level_access.insert(
            RsrcType::ExtClients,
            [(
                RsrcId::from(ALL_EXT_CLIENTS_RSRC_ID),
                PermissionScope::self_only_crud(),
            )]
            .into_iter()
            .collect(),
        );
    }
}
