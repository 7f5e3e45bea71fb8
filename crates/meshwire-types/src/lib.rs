//! core types for meshwire - a mesh-vpn control plane.
//!
//! this crate provides the fundamental data structures used throughout meshwire:
//! - [`Node`]: a device on the overlay network (including static clients)
//! - [`Acl`]: a tag-based access policy
//! - [`AclRule`]: the compiled allow-list shipped to a node's data plane
//! - [`User`], [`UserGroup`], [`Role`]: identity and permission entities
//! - [`SqlConfig`]: configuration for the sql-backed blob store

#![warn(missing_docs)]

mod acl;
mod config;
mod network;
mod node;
mod role;
mod rule;
mod tag;
pub mod test_utils;
mod user;

pub use acl::{
    Acl, AclId, PolicyKind, PolicyTag, PolicyTagKind, Protocol, ServiceType, TrafficDirection,
    WILDCARD, sort_acls,
};
pub use config::SqlConfig;
pub use network::{ALL_NETWORKS, Network, NetworkId};
pub use node::{Node, NodeId, StaticNode, TagSet};
pub use role::{
    ALL_EXT_CLIENTS_RSRC_ID, ALL_REMOTE_ACCESS_GWS_RSRC_ID, PermissionScope, Role, RoleId,
    RsrcId, RsrcType,
};
pub use rule::{AclRule, sort_ipnets, unique_ipnet_list};
pub use tag::{Tag, TagId};
pub use user::{GroupId, User, UserGroup};
