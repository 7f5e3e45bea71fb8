//! policy body validation against the directories.

use std::sync::Arc;

use meshwire_types::{Acl, GroupId, PolicyKind, PolicyTag, PolicyTagKind, TagId, WILDCARD};

use crate::directory::{GroupLookup, NetworkDirectory, TagDirectory, UserDirectory};
use crate::error::{PolicySide, Result, ValidationError};

/// validates policy bodies before they reach the registry.
///
/// concrete subjects and objects must resolve through the injected
/// directories, and each side's entry classes must match the rule type:
/// user policies take users and user groups as subjects and device tags
/// as objects; device policies take device tags on both sides.
pub struct PolicyValidator {
    networks: Arc<dyn NetworkDirectory>,
    tags: Arc<dyn TagDirectory>,
    users: Arc<dyn UserDirectory>,
    groups: Arc<dyn GroupLookup>,
}

impl PolicyValidator {
    /// create a validator over the given directories.
    pub fn new(
        networks: Arc<dyn NetworkDirectory>,
        tags: Arc<dyn TagDirectory>,
        users: Arc<dyn UserDirectory>,
        groups: Arc<dyn GroupLookup>,
    ) -> Self {
        Self {
            networks,
            tags,
            users,
            groups,
        }
    }

    /// validate a create request: the network must exist and the body
    /// must be structurally valid.
    pub fn validate_create(&self, acl: &Acl) -> Result<()> {
        if self.networks.get_network(&acl.network_id).is_none() {
            return Err(ValidationError::UnknownNetwork(acl.network_id.clone()).into());
        }
        self.validate_policy(acl)?;
        Ok(())
    }

    /// validate a policy body.
    pub fn validate_policy(&self, acl: &Acl) -> std::result::Result<(), ValidationError> {
        match acl.rule_type {
            PolicyKind::User => {
                for entry in &acl.src {
                    self.check_user_subject(acl, entry)?;
                }
                for entry in &acl.dst {
                    self.check_device_entry(entry, PolicySide::Dst, acl.rule_type)?;
                }
            }
            PolicyKind::Device => {
                for entry in &acl.src {
                    self.check_device_entry(entry, PolicySide::Src, acl.rule_type)?;
                }
                for entry in &acl.dst {
                    self.check_device_entry(entry, PolicySide::Dst, acl.rule_type)?;
                }
            }
        }
        Ok(())
    }

    fn check_user_subject(
        &self,
        acl: &Acl,
        entry: &PolicyTag,
    ) -> std::result::Result<(), ValidationError> {
        if entry.value.is_empty() {
            return Err(ValidationError::EmptyTagValue(PolicySide::Src));
        }
        if entry.value == WILDCARD {
            return Ok(());
        }
        match entry.kind {
            PolicyTagKind::User => {
                if self.users.get_user(&entry.value).is_none() {
                    return Err(ValidationError::UnknownUser(entry.value.clone()));
                }
            }
            PolicyTagKind::UserGroup => {
                let gid = GroupId::from(entry.value.as_str());
                if self.groups.get_group(&gid).is_none() {
                    return Err(ValidationError::UnknownGroup(gid));
                }
                let in_network = self
                    .groups
                    .groups_in_network(&acl.network_id)
                    .iter()
                    .any(|g| g.id == gid);
                if !in_network {
                    return Err(ValidationError::GroupOutsideNetwork(
                        gid,
                        acl.network_id.clone(),
                    ));
                }
            }
            kind => {
                return Err(ValidationError::KindNotAllowed {
                    kind,
                    side: PolicySide::Src,
                    rule: acl.rule_type,
                });
            }
        }
        Ok(())
    }

    fn check_device_entry(
        &self,
        entry: &PolicyTag,
        side: PolicySide,
        rule: PolicyKind,
    ) -> std::result::Result<(), ValidationError> {
        if entry.value.is_empty() {
            return Err(ValidationError::EmptyTagValue(side));
        }
        if entry.kind != PolicyTagKind::Device {
            return Err(ValidationError::KindNotAllowed {
                kind: entry.kind,
                side,
                rule,
            });
        }
        if entry.value == WILDCARD {
            return Ok(());
        }
        let tag = TagId::from(entry.value.as_str());
        if self.tags.get_tag(&tag).is_none() {
            return Err(ValidationError::UnknownTag(tag));
        }
        Ok(())
    }
}
