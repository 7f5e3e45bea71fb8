//! role and permission-template types.
//!
//! a role is a permission template: a per-resource-type access
//! descriptor. roles with `full_access` bypass the per-resource scopes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// the resource id granting a scope over every ext client.
pub const ALL_EXT_CLIENTS_RSRC_ID: &str = "all-ext-clients";

/// the resource id granting a scope over every remote-access gateway.
pub const ALL_REMOTE_ACCESS_GWS_RSRC_ID: &str = "all-remote-access-gws";

/// unique identifier for a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    /// platform role with unrestricted access, including role management.
    pub const SUPER_ADMIN: &'static str = "super-admin";
    /// platform role with unrestricted access.
    pub const ADMIN: &'static str = "admin";
    /// platform role for dashboard users without full access.
    pub const PLATFORM_USER: &'static str = "platform-user";
    /// platform role for vpn-only users.
    pub const SERVICE_USER: &'static str = "service-user";
    /// per-network administrative role.
    pub const NETWORK_ADMIN: &'static str = "network-admin";
    /// per-network member role.
    pub const NETWORK_USER: &'static str = "network-user";

    /// create a role id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// whether the id is empty (never valid for a real role).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// resource classes a role can grant access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RsrcType {
    /// overlay networks.
    Networks,
    /// nodes on the overlay.
    Nodes,
    /// remote-access (ingress) gateways.
    RemoteAccessGateways,
    /// static clients.
    ExtClients,
    /// users.
    Users,
    /// dns entries.
    Dns,
    /// acl policies.
    Acls,
}

/// identifier for a single resource inside a resource class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RsrcId(String);

impl RsrcId {
    /// create a resource id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RsrcId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RsrcId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// what a role may do with one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionScope {
    /// read access.
    pub read: bool,
    /// create access.
    pub create: bool,
    /// update access.
    pub update: bool,
    /// delete access.
    pub delete: bool,
    /// whether the scope grants vpn connectivity through the resource.
    pub vpn_access: bool,
    /// restrict the scope to resources the user owns.
    pub self_only: bool,
}

impl PermissionScope {
    /// full crud scope restricted to self-owned resources.
    pub fn self_only_crud() -> Self {
        Self {
            read: true,
            create: true,
            update: true,
            delete: true,
            vpn_access: false,
            self_only: true,
        }
    }
}

/// a permission template assignable to users and groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// unique identifier.
    pub id: RoleId,

    /// name shown in the dashboard.
    #[serde(default)]
    pub ui_name: String,

    /// whether this is a seeded default role.
    #[serde(default)]
    pub default: bool,

    /// bypass all per-resource scopes.
    #[serde(default)]
    pub full_access: bool,

    /// hide the dashboard from holders of this role.
    #[serde(default)]
    pub deny_dashboard_access: bool,

    /// per-resource-type access map.
    #[serde(default)]
    pub network_level_access: HashMap<RsrcType, HashMap<RsrcId, PermissionScope>>,
}

impl Role {
    /// seeded template: unrestricted platform owner.
    pub fn super_admin_template() -> Self {
        Self {
            id: RoleId::from(RoleId::SUPER_ADMIN),
            ui_name: "Super Admin".to_string(),
            default: true,
            full_access: true,
            deny_dashboard_access: false,
            network_level_access: HashMap::new(),
        }
    }

    /// seeded template: unrestricted administrator.
    pub fn admin_template() -> Self {
        Self {
            id: RoleId::from(RoleId::ADMIN),
            ui_name: "Admin".to_string(),
            default: true,
            full_access: true,
            deny_dashboard_access: false,
            network_level_access: HashMap::new(),
        }
    }

    /// seeded template: dashboard user without full access.
    pub fn platform_user_template() -> Self {
        Self {
            id: RoleId::from(RoleId::PLATFORM_USER),
            ui_name: "Network Admin".to_string(),
            default: true,
            full_access: false,
            deny_dashboard_access: false,
            network_level_access: HashMap::new(),
        }
    }

    /// seeded template: vpn-only user, no dashboard.
    pub fn service_user_template() -> Self {
        Self {
            id: RoleId::from(RoleId::SERVICE_USER),
            ui_name: "Network User".to_string(),
            default: true,
            full_access: false,
            deny_dashboard_access: true,
            network_level_access: HashMap::new(),
        }
    }
}
