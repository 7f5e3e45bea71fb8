//! acl policy model.
//!
//! policies are allow-rules matching tagged subjects (`src`) to tagged
//! objects (`dst`) within a network. The model is allow-only with
//! default-deny; overlapping policies compose by set-union.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::NetworkId;

/// the only legal non-concrete subject/object value.
pub const WILDCARD: &str = "*";

/// unique identifier for an acl policy, of the form `<network>.<slug>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AclId(String);

impl AclId {
    /// build a policy id from its network and slug parts.
    pub fn new(net: &NetworkId, slug: &str) -> Self {
        Self(format!("{net}.{slug}"))
    }

    /// get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// the network part of the id (everything before the first dot).
    pub fn network(&self) -> Option<NetworkId> {
        self.0.split_once('.').map(|(net, _)| NetworkId::from(net))
    }
}

impl fmt::Display for AclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AclId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AclId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// what kind of principals a policy matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    /// device tags on both sides.
    #[serde(rename = "device-policy")]
    Device,
    /// users or user groups on the src side, device tags on the dst side.
    #[serde(rename = "user-policy")]
    User,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Device => write!(f, "device-policy"),
            PolicyKind::User => write!(f, "user-policy"),
        }
    }
}

/// the class of identifier a [`PolicyTag`] value is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyTagKind {
    /// a device tag id.
    Device,
    /// a username.
    User,
    /// a user group id.
    UserGroup,
    /// a network role id.
    UserRole,
}

impl fmt::Display for PolicyTagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyTagKind::Device => write!(f, "device"),
            PolicyTagKind::User => write!(f, "user"),
            PolicyTagKind::UserGroup => write!(f, "user-group"),
            PolicyTagKind::UserRole => write!(f, "user-role"),
        }
    }
}

/// one subject or object entry in a policy's `src`/`dst` list.
///
/// the value is either a concrete identifier of the given kind or the
/// [`WILDCARD`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTag {
    /// identifier class the value belongs to.
    pub kind: PolicyTagKind,

    /// concrete identifier, or `"*"`.
    pub value: String,
}

impl PolicyTag {
    /// a device-tag entry.
    pub fn device(value: impl Into<String>) -> Self {
        Self {
            kind: PolicyTagKind::Device,
            value: value.into(),
        }
    }

    /// a username entry.
    pub fn user(value: impl Into<String>) -> Self {
        Self {
            kind: PolicyTagKind::User,
            value: value.into(),
        }
    }

    /// a user-group entry.
    pub fn user_group(value: impl Into<String>) -> Self {
        Self {
            kind: PolicyTagKind::UserGroup,
            value: value.into(),
        }
    }

    /// a network-role entry.
    pub fn user_role(value: impl Into<String>) -> Self {
        Self {
            kind: PolicyTagKind::UserRole,
            value: value.into(),
        }
    }

    /// whether the entry is the wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }
}

/// network protocol a policy allows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// all protocols.
    #[default]
    All,
    /// transmission control protocol.
    Tcp,
    /// user datagram protocol.
    Udp,
    /// internet control message protocol.
    Icmp,
}

/// well-known service shorthand for a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// any service; forces [`Protocol::All`] and an empty port list.
    #[default]
    Any,
    /// ssh (tcp/22).
    Ssh,
    /// http (tcp/80).
    Http,
    /// https (tcp/443).
    Https,
    /// custom protocol/port combination.
    Custom,
}

/// which way traffic may be initiated under a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficDirection {
    /// src may initiate toward dst only.
    Uni,
    /// either side may initiate.
    Bi,
}

/// a tag-based access policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acl {
    /// stable id of the form `<network>.<slug>`.
    pub id: AclId,

    /// human-readable name.
    pub name: String,

    /// free-form description shown in the ui.
    #[serde(default)]
    pub meta_data: String,

    /// network the policy is scoped to.
    pub network_id: NetworkId,

    /// device-to-device or user-to-device.
    pub rule_type: PolicyKind,

    /// allowed protocol.
    #[serde(default)]
    pub proto: Protocol,

    /// well-known service shorthand.
    #[serde(default)]
    pub service_type: ServiceType,

    /// allowed ports; entries may be single ports or `lo-hi` ranges.
    #[serde(default)]
    pub port: Vec<String>,

    /// subjects the policy matches.
    pub src: Vec<PolicyTag>,

    /// objects the policy matches.
    pub dst: Vec<PolicyTag>,

    /// direction traffic may be initiated in.
    pub allowed_direction: TrafficDirection,

    /// whether the policy is in force.
    pub enabled: bool,

    /// whether this is an auto-seeded default policy.
    ///
    /// default policies only allow their `enabled` flag to change.
    #[serde(default)]
    pub default: bool,

    /// who created the policy.
    #[serde(default)]
    pub created_by: String,

    /// when the policy was created.
    pub created_at: DateTime<Utc>,
}

impl Acl {
    /// enforce the service-type invariant: `Any` implies all protocols
    /// and no port restriction.
    pub fn normalize(&mut self) {
        if self.service_type == ServiceType::Any {
            self.proto = Protocol::All;
            self.port.clear();
        }
    }

    /// whether the invariant enforced by [`Acl::normalize`] already holds.
    pub fn is_normalized(&self) -> bool {
        self.service_type != ServiceType::Any
            || (self.proto == Protocol::All && self.port.is_empty())
    }
}

/// sort policies by name for stable listings.
pub fn sort_acls(acls: &mut [Acl]) {
    acls.sort_by(|a, b| a.name.cmp(&b.name));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(id: &str) -> Acl {
        Acl {
            id: AclId::from(id),
            name: "test".to_string(),
            meta_data: String::new(),
            network_id: NetworkId::from("mesh"),
            rule_type: PolicyKind::Device,
            proto: Protocol::Tcp,
            service_type: ServiceType::Custom,
            port: vec!["443".to_string()],
            src: vec![PolicyTag::device("web")],
            dst: vec![PolicyTag::device("db")],
            allowed_direction: TrafficDirection::Uni,
            enabled: true,
            default: false,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_acl_id_parts() {
        let id = AclId::new(&NetworkId::from("mesh"), "all-nodes");
        assert_eq!(id.as_str(), "mesh.all-nodes");
        assert_eq!(id.network(), Some(NetworkId::from("mesh")));
    }

    #[test]
    fn test_normalize_any_service() {
        let mut acl = policy("mesh.web-db");
        acl.service_type = ServiceType::Any;
        assert!(!acl.is_normalized());

        acl.normalize();
        assert_eq!(acl.proto, Protocol::All);
        assert!(acl.port.is_empty());
        assert!(acl.is_normalized());
    }

    #[test]
    fn test_normalize_keeps_custom_service() {
        let mut acl = policy("mesh.web-db");
        acl.normalize();
        assert_eq!(acl.proto, Protocol::Tcp);
        assert_eq!(acl.port, vec!["443".to_string()]);
    }

    #[test]
    fn test_policy_serde_roundtrip() {
        let acl = policy("mesh.web-db");
        let json = serde_json::to_string(&acl).unwrap();
        let parsed: Acl = serde_json::from_str(&json).unwrap();
        assert_eq!(acl, parsed);
    }

    #[test]
    fn test_policy_tag_wildcard() {
        assert!(PolicyTag::device(WILDCARD).is_wildcard());
        assert!(!PolicyTag::device("web").is_wildcard());
    }

    #[test]
    fn test_direction_serde() {
        assert_eq!(
            serde_json::to_string(&TrafficDirection::Bi).unwrap(),
            "\"bi\""
        );
        let dir: TrafficDirection = serde_json::from_str("\"uni\"").unwrap();
        assert_eq!(dir, TrafficDirection::Uni);
    }

    #[test]
    fn test_sort_acls_by_name() {
        let mut a = policy("mesh.a");
        a.name = "zeta".to_string();
        let mut b = policy("mesh.b");
        b.name = "alpha".to_string();

        let mut acls = vec![a, b];
        sort_acls(&mut acls);
        assert_eq!(acls[0].name, "alpha");
    }
}
