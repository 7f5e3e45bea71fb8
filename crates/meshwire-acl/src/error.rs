//! error types for meshwire-acl.

use std::fmt;

use thiserror::Error;

use meshwire_types::{AclId, GroupId, NetworkId, PolicyKind, PolicyTagKind, RoleId, TagId};

/// errors surfaced by the policy engine.
#[derive(Debug, Error)]
pub enum Error {
    /// no policy with the given id.
    #[error("policy {0} not found")]
    PolicyNotFound(AclId),

    /// the canonical default policy for a network is missing.
    #[error("default policy not found for network {0}")]
    DefaultPolicyNotFound(NetworkId),

    /// a policy with the given id already exists.
    #[error("policy {0} already exists")]
    PolicyExists(AclId),

    /// the policy body failed validation.
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] ValidationError),

    /// no role with the given id.
    #[error("role {0} not found")]
    RoleNotFound(RoleId),

    /// a role with the given id already exists.
    #[error("role {0} already exists")]
    RoleExists(RoleId),

    /// the role is still held by users and cannot be deleted.
    #[error("role {0} is assigned to active users; reassign them before deleting")]
    RoleInUse(RoleId),

    /// seeded default roles cannot be modified.
    #[error("default role {0} cannot be modified")]
    DefaultRoleImmutable(RoleId),

    /// a role id was empty.
    #[error("role id cannot be empty")]
    EmptyRoleId,

    /// no user group with the given id.
    #[error("user group {0} not found")]
    GroupNotFound(GroupId),

    /// a user group with the given id already exists.
    #[error("user group {0} already exists")]
    GroupExists(GroupId),

    /// a group id was empty.
    #[error("group id cannot be empty")]
    EmptyGroupId,

    /// no user with the given name.
    #[error("user {0} not found")]
    UserNotFound(String),

    /// json encode/decode failure for a stored entity.
    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    /// underlying store failure.
    #[error(transparent)]
    Store(#[from] meshwire_store::Error),
}

/// which side of a policy an entry sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySide {
    /// the subject list.
    Src,
    /// the object list.
    Dst,
}

impl fmt::Display for PolicySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicySide::Src => write!(f, "src"),
            PolicySide::Dst => write!(f, "dst"),
        }
    }
}

/// structural violations in a policy body.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// the policy's network does not exist.
    #[error("network {0} does not exist")]
    UnknownNetwork(NetworkId),

    /// a src/dst entry carried an empty value.
    #[error("{0} entry has an empty value")]
    EmptyTagValue(PolicySide),

    /// an entry class not legal for the rule type on that side.
    #[error("{kind} entries are not allowed in {side} of a {rule} policy")]
    KindNotAllowed {
        /// the offending entry class.
        kind: PolicyTagKind,
        /// the side the entry sat on.
        side: PolicySide,
        /// the policy's rule type.
        rule: PolicyKind,
    },

    /// a concrete device tag that does not resolve.
    #[error("device tag {0} does not exist")]
    UnknownTag(TagId),

    /// a concrete username that does not resolve.
    #[error("user {0} does not exist")]
    UnknownUser(String),

    /// a user group that does not resolve.
    #[error("user group {0} does not exist")]
    UnknownGroup(GroupId),

    /// a user group from outside the policy's network.
    #[error("user group {0} does not belong to network {1}")]
    GroupOutsideNetwork(GroupId, NetworkId),

    /// a network role reference that does not resolve.
    #[error("network role {0} does not exist")]
    UnknownRole(RoleId),
}

/// result type for policy engine operations.
pub type Result<T> = std::result::Result<T, Error>;
