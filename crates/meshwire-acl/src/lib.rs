//! acl policy engine for meshwire.
//!
//! this crate decides which peers on the overlay may communicate and
//! which firewall rules each node installs on its data-plane interface.
//! Policies are tag-based allow-rules with deny-by-default semantics;
//! overlapping policies compose by set-union.
//!
//! the engine is built from five cooperating parts:
//! - [`AclRegistry`]: durable policy storage with a coherent in-memory cache
//! - [`RoleRegistry`] / [`GroupRegistry`]: permission templates and user groups
//! - [`IdentityResolver`]: evaluation-time indexes over nodes and users
//! - [`PolicyEvaluator`]: "may these two principals communicate?"
//! - [`RuleCompiler`]: per-node `policy id -> allow-list` compilation

#![warn(missing_docs)]

pub mod access;
pub mod compiler;
pub mod directory;
pub mod error;
pub mod evaluator;
pub mod groups;
pub mod registry;
pub mod resolver;
pub mod roles;
pub mod testing;
pub mod validate;

pub use access::UserAccess;
pub use compiler::RuleCompiler;
pub use directory::{
    GroupLookup, NetworkDirectory, NodeDirectory, PeerBroker, TagDirectory, UserDirectory,
};
pub use error::{Error, PolicySide, Result, ValidationError};
pub use evaluator::PolicyEvaluator;
pub use groups::{GroupRegistry, revoke_gw_access_on_role_change};
pub use registry::{
    ALL_NODES_SLUG, ALL_REMOTE_ACCESS_GWS_SLUG, ALL_USERS_SLUG, AclRegistry, REMOTE_ACCESS_TAG,
};
pub use resolver::IdentityResolver;
pub use roles::RoleRegistry;
pub use validate::PolicyValidator;
